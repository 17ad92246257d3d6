//! Severity-ordered diagnostics and the `Outcome` carrier.
//!
//! Every fallible stage of checking and expansion reports through [`Message`]
//! values instead of aborting: one malformed instance must never block its
//! siblings. [`Outcome`] pairs an optional value with the messages produced
//! while computing it, so callers can aggregate partial results and decide at
//! the end how severe the run was.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Message severities, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Message {
            severity,
            text: text.into(),
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Message::new(Severity::Info, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Message::new(Severity::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Message::new(Severity::Error, text)
    }

    pub fn fatal(text: impl Into<String>) -> Self {
        Message::new(Severity::Fatal, text)
    }

    /// True for `Error` and `Fatal` messages.
    pub fn is_failure(&self) -> bool {
        self.severity >= Severity::Error
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.text)
    }
}

/// Returns the most severe severity among `messages`, if any.
pub fn most_severe(messages: &[Message]) -> Option<Severity> {
    messages.iter().map(|m| m.severity).max()
}

/// A value together with the diagnostics produced while computing it.
///
/// Invariant: an `Outcome` without a value carries at least one failure
/// message. An `Outcome` with a value may still carry messages of any
/// severity, e.g. warnings collected along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    value: Option<T>,
    messages: Vec<Message>,
}

/// A lazy, pull-driven stream of per-item outcomes.
pub type OutcomeStream<'a, T> = Box<dyn Iterator<Item = Outcome<T>> + 'a>;

impl<T> Outcome<T> {
    pub fn ok(value: T) -> Self {
        Outcome {
            value: Some(value),
            messages: Vec::new(),
        }
    }

    pub fn ok_with(value: T, messages: Vec<Message>) -> Self {
        Outcome {
            value: Some(value),
            messages,
        }
    }

    /// An empty outcome explained by `message`. The message is promoted to
    /// `Error` if it would not otherwise count as a failure.
    pub fn fail(message: Message) -> Self {
        let message = if message.is_failure() {
            message
        } else {
            Message::new(Severity::Error, message.text)
        };
        Outcome {
            value: None,
            messages: vec![message],
        }
    }

    pub fn fail_with(messages: Vec<Message>) -> Self {
        debug_assert!(messages.iter().any(Message::is_failure));
        Outcome {
            value: None,
            messages,
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_parts(self) -> (Option<T>, Vec<Message>) {
        (self.value, self.messages)
    }

    pub fn most_severe(&self) -> Option<Severity> {
        most_severe(&self.messages)
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: self.value.map(f),
            messages: self.messages,
        }
    }

    /// Chains a computation on the value, keeping the messages of both steps.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self.value {
            Some(v) => {
                let mut next = f(v);
                let mut messages = self.messages;
                messages.append(&mut next.messages);
                Outcome {
                    value: next.value,
                    messages,
                }
            }
            None => Outcome {
                value: None,
                messages: self.messages,
            },
        }
    }

    /// Collects many outcomes into one. The value is present iff every input
    /// had a value; all messages are kept in input order.
    pub fn aggregate(items: impl IntoIterator<Item = Outcome<T>>) -> Outcome<Vec<T>> {
        let mut values = Some(Vec::new());
        let mut messages = Vec::new();
        for item in items {
            let (value, mut msgs) = item.into_parts();
            messages.append(&mut msgs);
            match (value, &mut values) {
                (Some(v), Some(acc)) => acc.push(v),
                _ => values = None,
            }
        }
        Outcome {
            value: values,
            messages,
        }
    }
}
