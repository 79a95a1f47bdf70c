use anchorage_core::ComponentId;

use super::Workspace;

pub fn run(workspace: &Workspace, contract: &str) -> anyhow::Result<()> {
    let contract = ComponentId::new(contract);
    if !workspace.driver.graph().contains(&contract) {
        anyhow::bail!("'{}' is not declared in the manifest", contract);
    }

    let known = workspace.driver.known_types().resolve(&contract);
    if known.is_empty() {
        println!("No known types under {}", contract);
        return Ok(());
    }

    for id in known {
        println!("{}", id);
    }

    Ok(())
}
