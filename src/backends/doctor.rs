//! Doctor - Dependency checking

use anyhow::Result;

use crate::backends::engine::EngineCommand;
use crate::core::model::{ItemError, ResultItem, ResultSet};
use crate::core::render::{RenderConfig, Renderer};
use crate::core::util::command_exists;

/// Dependency status
#[derive(Debug, Clone)]
pub struct DependencyStatus {
    pub name: String,
    pub available: bool,
    pub command: String,
    pub notes: Option<String>,
}

impl DependencyStatus {
    pub fn to_result_item(&self) -> ResultItem {
        let status = if self.available { "✓" } else { "✗" };
        let mut message = format!(
            "{} {} ({})",
            status,
            self.name,
            if self.available {
                format!("found: {}", self.command)
            } else {
                "not found".to_string()
            }
        );

        if let Some(notes) = &self.notes {
            message.push_str(&format!("\n  Note: {}", notes));
        }

        let mut item = if self.available {
            ResultItem::file(self.command.clone())
        } else {
            let mut item = ResultItem::error(ItemError::new(
                "ENGINE_NOT_FOUND",
                format!("{} is required but '{}' was not found", self.name, self.command),
            ));
            item.path = Some(self.command.clone());
            item
        };
        item.excerpt = Some(message);
        item
    }
}

/// Check the configured query engine
pub fn check_dependencies(engine: &EngineCommand) -> Vec<DependencyStatus> {
    let command = engine.program().display().to_string();
    vec![DependencyStatus {
        name: "query engine".to_string(),
        available: command_exists(&command),
        command,
        notes: Some("Install yq v4: https://github.com/mikefarah/yq".to_string()),
    }]
}

/// Run the doctor command
pub fn run_doctor(engine: &EngineCommand, config: RenderConfig) -> Result<()> {
    let deps = check_dependencies(engine);

    let result_set: ResultSet = deps.iter().map(DependencyStatus::to_result_item).collect();

    let renderer = Renderer::with_config(config);
    println!("{}", renderer.render(&result_set));

    if deps.iter().any(|d| !d.available) {
        tracing::warn!("the query engine is missing; evaluations will find no records");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Kind;

    #[test]
    fn test_check_dependencies_reports_engine() {
        let deps = check_dependencies(&EngineCommand::new("sh"));
        assert_eq!(deps.len(), 1);
        assert!(deps[0].available);
        assert_eq!(deps[0].command, "sh");
    }

    #[test]
    fn test_missing_engine_is_an_error_item() {
        let deps = check_dependencies(&EngineCommand::new("no-such-engine-xyz"));
        let item = deps[0].to_result_item();
        assert_eq!(item.kind, Kind::Error);
        assert_eq!(item.errors[0].code, "ENGINE_NOT_FOUND");
        assert_eq!(item.path.as_deref(), Some("no-such-engine-xyz"));
        assert!(item.excerpt.unwrap().starts_with("✗"));
    }

    #[test]
    fn test_available_engine_item() {
        let item = check_dependencies(&EngineCommand::new("sh"))[0].to_result_item();
        assert_eq!(item.kind, Kind::File);
        assert!(item.excerpt.unwrap().starts_with("✓"));
    }
}
