use anyhow::Result;
use dialoguer::{Confirm, Select};
use mediadupe_core::db::RecordStore;
use mediadupe_core::dedup::{DedupEngine, DedupSession};

use crate::render;

const ACTIONS: &[&str] = &[
    "Choose keepers on this page",
    "Keep selected & purge duplicates",
    "Next page",
    "Previous page",
    "Quit",
];

/// Interactive page-by-page review of a loaded session.
pub fn run<S: RecordStore + ?Sized>(engine: &DedupEngine<'_, S>, mut session: DedupSession) -> Result<()> {
    loop {
        render::page(&session);
        if session.groups().is_empty() {
            return Ok(());
        }
        println!();

        let action = Select::new()
            .with_prompt("Action")
            .items(ACTIONS)
            .default(0)
            .interact()?;

        match action {
            0 => choose_keepers(&mut session)?,
            1 => {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Copy non-keepers on page {} to {} and mark them purged?",
                        session.page_index() + 1,
                        engine.config().quarantine_dir.display()
                    ))
                    .default(false)
                    .interact()?;
                if confirmed {
                    let report = engine.purge_page(&mut session)?;
                    render::purge_report(&report);
                }
            }
            2 => {
                if !session.next_page() {
                    println!("Already on the last page.");
                }
            }
            3 => {
                if !session.prev_page() {
                    println!("Already on the first page.");
                }
            }
            _ => return Ok(()),
        }
    }
}

fn choose_keepers(session: &mut DedupSession) -> Result<()> {
    let offset = session.page_offset();
    let page: Vec<_> = session.current_page().to_vec();

    for (i, group) in page.iter().enumerate() {
        let Some(current) = session.keeper_for(group) else {
            println!("Group {}: every member is already purged.", offset + i + 1);
            continue;
        };
        let labels: Vec<String> = group.members.iter().map(render::member_label).collect();
        let choice = Select::new()
            .with_prompt(format!("Group {}: file to keep", offset + i + 1))
            .items(&labels)
            .default(current)
            .interact()?;

        if session.select_keeper(&group.fingerprint, choice) != Some(choice) {
            println!("That file is already purged; keeping the first active file instead.");
        }
    }
    Ok(())
}
