use super::Workspace;

pub fn run(workspace: &Workspace) -> anyhow::Result<()> {
    let summary = &workspace.summary;
    let tags: Vec<&str> = workspace
        .driver
        .config()
        .environment_tags
        .iter()
        .map(|tag| tag.as_str())
        .collect();

    println!(
        "✓ {} types, {} components",
        workspace.manifest.types.len(),
        workspace.manifest.components.len()
    );
    if tags.is_empty() {
        println!("Environment: (no tags)");
    } else {
        println!("Environment: {}", tags.join(", "));
    }

    println!("Bound:       {}", summary.bound);
    println!("Replaced:    {}", summary.replaced);
    println!("Rejected:    {}", summary.rejected);
    println!("List slots:  {}", summary.list_members);
    println!(
        "Skipped:     {} non-concrete, {} environment, {} without lifetime",
        summary.skipped_non_concrete, summary.skipped_environment, summary.skipped_no_lifetime
    );

    tracing::info!(bindings = workspace.driver.bindings().len(), "Manifest check passed");
    Ok(())
}
