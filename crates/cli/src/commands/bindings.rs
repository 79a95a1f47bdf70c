use anchorage_core::Binding;
use serde::Serialize;

use super::Workspace;

#[derive(Serialize)]
struct BindingReport<'a> {
    unscoped: Vec<&'a Binding>,
    anchored: Vec<&'a Binding>,
}

pub fn run(workspace: &Workspace, json: bool) -> anyhow::Result<()> {
    let table = workspace.driver.bindings();
    let report = BindingReport {
        unscoped: table.unscoped().collect(),
        anchored: table.anchored().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.unscoped.is_empty() && report.anchored.is_empty() {
        println!("No bindings");
        return Ok(());
    }

    for binding in report.unscoped.iter().chain(report.anchored.iter()) {
        match &binding.anchor {
            Some(anchor) => println!(
                "{} -> {} ({}, anchored to {})",
                binding.contract, binding.implementation, binding.lifetime, anchor
            ),
            None => println!(
                "{} -> {} ({})",
                binding.contract, binding.implementation, binding.lifetime
            ),
        }
    }

    Ok(())
}
