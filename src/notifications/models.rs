//! Notification data models

use crate::optimizer::{JobError, OptimizationResult, Target};
use serde::{Deserialize, Serialize};

/// Notification type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Started,
    Busy,
    Cancelled,
    Succeeded,
    Failed,
    DependencyMissing,
}

/// A notification for the host UI. Fire-and-forget.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Tooltip shown when a job starts computing.
    Started {
        job_id: u64,
        target: Target,
        description: String,
    },
    /// A submission was turned away because `description` is still running.
    Busy { description: String },
    Cancelled { target: Target },
    /// `listing` is the full `const deckParams = [...]` rendering of the store.
    Succeeded {
        result: OptimizationResult,
        listing: String,
    },
    Failed { target: Target, error: JobError },
    DependencyMissing { guidance: String },
}

impl Notification {
    pub fn notification_type(&self) -> NotificationType {
        match self {
            Notification::Started { .. } => NotificationType::Started,
            Notification::Busy { .. } => NotificationType::Busy,
            Notification::Cancelled { .. } => NotificationType::Cancelled,
            Notification::Succeeded { .. } => NotificationType::Succeeded,
            Notification::Failed { .. } => NotificationType::Failed,
            Notification::DependencyMissing { .. } => NotificationType::DependencyMissing,
        }
    }

    /// True for the one notification that ends an accepted or declined job.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Notification::Cancelled { .. }
                | Notification::Succeeded { .. }
                | Notification::Failed { .. }
        )
    }

    pub fn title(&self) -> &'static str {
        match self {
            Notification::Started { .. } => "Optimization started",
            Notification::Busy { .. } => "Optimizer busy",
            Notification::Cancelled { .. } => "Optimization cancelled",
            Notification::Succeeded { .. } => "Optimization complete",
            Notification::Failed { .. } => "Optimization failed",
            Notification::DependencyMissing { .. } => "Optimizer not installed",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Notification::Started { description, .. } => description.clone(),
            Notification::Busy { description } => {
                format!("Waiting for '{}' to complete", description)
            }
            Notification::Cancelled { target } => {
                format!("Optimization of {} was cancelled", target)
            }
            Notification::Succeeded { result, .. } => format!(
                "{} optimized with {} weights, requested retention {}",
                result.deck_name,
                result.weights.len(),
                result.request_retention
            ),
            Notification::Failed { target, error } => {
                format!("Optimization of {} failed. {}", target, error)
            }
            Notification::DependencyMissing { guidance } => guidance.clone(),
        }
    }
}
