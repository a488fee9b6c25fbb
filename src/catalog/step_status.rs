catalog_enum! {
    /// Lifecycle of a single step instance. Only `Todo` is non-terminal.
    StepStatus, "step status" {
        Todo = 1 => "TODO",
        Done = 2 => "DONE",
        Skipped = 3 => "SKIPPED",
        Failed = 4 => "FAILED",
        Duplicate = 5 => "DUPLICATE",
    }
}

impl StepStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (StepStatus::Todo, StepStatus::Done)
                | (StepStatus::Todo, StepStatus::Failed)
                | (StepStatus::Todo, StepStatus::Skipped)
                | (StepStatus::Todo, StepStatus::Duplicate)
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, StepStatus::Todo)
    }
}

#[cfg(test)]
mod tests {
    use super::StepStatus;

    #[test]
    fn todo_is_catalog_id_one() {
        assert_eq!(StepStatus::Todo.id(), 1);
        assert_eq!(StepStatus::from_id(1), Some(StepStatus::Todo));
        assert_eq!(StepStatus::from_id(99), None);
    }

    #[test]
    fn terminal_statuses_never_move() {
        for status in StepStatus::ALL.iter().copied().filter(|s| s.is_terminal()) {
            for next in StepStatus::ALL.iter().copied() {
                assert!(
                    !status.can_transition_to(next),
                    "{status} must not move to {next}"
                );
            }
        }
        assert!(!StepStatus::Todo.can_transition_to(StepStatus::Todo));
        assert!(StepStatus::Todo.can_transition_to(StepStatus::Failed));
    }
}
