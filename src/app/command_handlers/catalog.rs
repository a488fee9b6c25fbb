use crate::catalog::{ProcessTypeId, StepStatus, StepTypeId};

pub fn cmd_catalog() -> Result<String, String> {
    let mut lines = vec!["process_types:".to_string()];
    for process_type in ProcessTypeId::ALL {
        lines.push(format!("  {:>3} {}", process_type.id(), process_type.label()));
    }
    lines.push("step_types:".to_string());
    for step_type in StepTypeId::ALL {
        let mut line = format!(
            "  {:>3} {} process_type={}",
            step_type.id(),
            step_type.label(),
            step_type.process_type()
        );
        if let Some(retrigger) = step_type.retrigger().filter(|r| *r != *step_type) {
            line.push_str(&format!(" retrigger={retrigger}"));
        }
        if let Some(decline) = step_type.decline() {
            line.push_str(&format!(" decline={decline}"));
        }
        lines.push(line);
    }
    lines.push("step_statuses:".to_string());
    for status in StepStatus::ALL {
        lines.push(format!("  {:>3} {}", status.id(), status.label()));
    }
    Ok(lines.join("\n"))
}
