use super::Workspace;

pub fn run(workspace: &Workspace) -> anyhow::Result<()> {
    let lists = workspace.driver.lists();
    if lists.is_empty() {
        println!("No lists");
        return Ok(());
    }

    for (list, members) in lists.lists() {
        println!("{} ({} members)", list, members.len());
        for member in members {
            println!("  - {}", member);
        }
    }

    Ok(())
}
