//! Output formatting for CLI commands.
//!
//! This module renders the report tables shown to the operator: stack
//! listings, resource reports, change previews and drift verdicts.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::cfn::{
    ChangePreview, DriftOutcome, StackEventInfo, StackListing, StackResourceInfo,
};

/// Output formatter for CLI reports.
#[derive(Debug, Default)]
pub struct OutputFormatter;

/// Stack listing row for table display.
#[derive(Tabled)]
struct StackRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Name")]
    name: String,
}

/// Resource row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Physical ID")]
    physical_id: String,
    #[tabled(rename = "Resource Status")]
    resource_status: String,
    #[tabled(rename = "Resource Type")]
    resource_type: String,
    #[tabled(rename = "Drift Info")]
    drift: String,
}

/// Change preview row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Resource Type")]
    resource_type: String,
    #[tabled(rename = "Replacement")]
    replacement: String,
}

/// Stack event row for table display.
#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Logical ID")]
    logical_id: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Formats a region stack listing.
    #[must_use]
    pub fn format_stack_list(&self, stacks: &[StackListing]) -> String {
        if stacks.is_empty() {
            return String::from("No stacks found.\n");
        }

        let rows: Vec<StackRow> = stacks
            .iter()
            .map(|stack| StackRow {
                status: colorize_status(&stack.status),
                name: stack.name.clone(),
            })
            .collect();

        format!("Stack(s):\n{}\n", Table::new(rows))
    }

    /// Formats a per-resource report for a stack.
    #[must_use]
    pub fn format_resources(&self, stack_name: &str, resources: &[StackResourceInfo]) -> String {
        if resources.is_empty() {
            return format!("No resources found for {stack_name}.\n");
        }

        let rows: Vec<ResourceRow> = resources
            .iter()
            .map(|resource| ResourceRow {
                logical_id: resource.logical_id.clone(),
                physical_id: resource.physical_id.clone(),
                resource_status: colorize_status(&resource.resource_status),
                resource_type: resource.resource_type.clone(),
                drift: resource.drift_status.clone(),
            })
            .collect();

        format!("Resource Report - {stack_name}:\n{}\n", Table::new(rows))
    }

    /// Formats a change preview.
    #[must_use]
    pub fn format_change_preview(&self, preview: &ChangePreview) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "Change preview {} finished with status {}",
            preview.id,
            colorize_status(&preview.status)
        );

        if let Some(reason) = &preview.status_reason {
            let _ = writeln!(output, "  {reason}");
        }

        if preview.changes.is_empty() {
            let _ = writeln!(output, "No changes reported.");
            return output;
        }

        let rows: Vec<ChangeRow> = preview
            .changes
            .iter()
            .map(|change| ChangeRow {
                action: change.action.clone(),
                logical_id: change.logical_id.clone(),
                resource_type: change.resource_type.clone(),
                replacement: change
                    .replacement
                    .clone()
                    .unwrap_or_else(|| String::from("-")),
            })
            .collect();

        let _ = writeln!(output, "{}", Table::new(rows));
        output
    }

    /// Formats a drift verdict, with the per-resource table when present.
    #[must_use]
    pub fn format_drift(&self, stack_name: &str, outcome: &DriftOutcome) -> String {
        let verdict = if outcome.in_sync() {
            outcome.verdict.green().to_string()
        } else {
            outcome.verdict.red().to_string()
        };

        let mut output = format!("Drift of {stack_name}: {verdict}\n");

        if !outcome.resources.is_empty() {
            let rows: Vec<ResourceRow> = outcome
                .resources
                .iter()
                .map(|resource| ResourceRow {
                    logical_id: resource.logical_id.clone(),
                    physical_id: resource.physical_id.clone(),
                    resource_status: colorize_status(&resource.resource_status),
                    resource_type: resource.resource_type.clone(),
                    drift: resource.drift_status.clone(),
                })
                .collect();

            let _ = writeln!(output, "{}", Table::new(rows));
        }

        output
    }

    /// Formats recent stack events for failure reporting.
    #[must_use]
    pub fn format_events(&self, stack_name: &str, events: &[StackEventInfo]) -> String {
        if events.is_empty() {
            return format!("No events found for {stack_name}.\n");
        }

        let rows: Vec<EventRow> = events
            .iter()
            .map(|event| EventRow {
                time: event.timestamp.clone(),
                status: colorize_status(&event.status),
                logical_id: event.logical_id.clone(),
                reason: event.reason.clone().unwrap_or_default(),
            })
            .collect();

        format!("Recent events for {stack_name}:\n{}\n", Table::new(rows))
    }
}

/// Colors a status string by how it should make the operator feel.
fn colorize_status(status: &str) -> String {
    if status.ends_with("FAILED") || status.contains("ROLLBACK") {
        status.red().to_string()
    } else if status.ends_with("COMPLETE") {
        status.green().to_string()
    } else {
        status.yellow().to_string()
    }
}
