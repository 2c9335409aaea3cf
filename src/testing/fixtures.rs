//! Pre-built tasks and implementations for tests.

use crate::task::{Complexity, Task, TaskType};

/// The reference scenario: a medium UI login form with validation.
#[must_use]
pub fn login_form_task() -> Task {
    Task::new("t1", "Create a login form component with validation")
        .with_type(TaskType::Ui)
        .with_complexity(Complexity::Medium)
}

/// A logic task with async work.
#[must_use]
pub fn async_fetch_task() -> Task {
    Task::new("t2", "Write a function that fetches users with async retry and caching")
        .with_type(TaskType::Logic)
        .with_complexity(Complexity::High)
}

/// A small design task.
#[must_use]
pub fn simple_design_task() -> Task {
    Task::new("t3", "Design a simple color palette card")
        .with_type(TaskType::Design)
        .with_complexity(Complexity::Low)
}

/// A task that fails validation (empty description).
#[must_use]
pub fn invalid_task() -> Task {
    Task::new("bad", "   ")
}

/// A fenced, accessible React implementation.
pub const LOGIN_FORM_IMPLEMENTATION: &str = r#"Here is the component:

```tsx
import React, { useState } from 'react';

// Login form with inline validation.
interface LoginFormProps {
  onSubmit: (email: string) => Promise<void>;
}

export function LoginForm({ onSubmit }: LoginFormProps) {
  const [email, setEmail] = useState('');
  const [error, setError] = useState<string | null>(null);

  async function handleSubmit() {
    if (!email) {
      setError('Email is required');
      return;
    }
    try {
      await onSubmit(email);
    } catch (e) {
      setError('Login failed');
    }
  }

  return (
    <form aria-label="Login" className="flex flex-col gap-2 md:w-1/2">
      <label htmlFor="email">Email</label>
      <input id="email" value={email} onChange={e => setEmail(e.target.value)} />
      {error && <p role="alert">{error}</p>}
      <button type="submit" onClick={handleSubmit}>Log in</button>
    </form>
  );
}
```
"#;

/// An implementation with no fence and minimal structure.
pub const BARE_IMPLEMENTATION: &str = "var form = document.createElement('form');";
