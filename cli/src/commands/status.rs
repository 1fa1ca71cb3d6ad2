//! `chaintap status` — a pure read that prints, per contract, last synced
//! block, total event count, sync status, and time since last commit.

use chaintap_core::config::Config;
use chaintap_core::ChaintapError;
use chrono::Utc;

use crate::wiring::Components;

pub async fn run(config: Config, components: Components) -> Result<(), ChaintapError> {
    for contract in &config.contracts {
        let state = components.storage.get_sync_state(&contract.address).await?;
        let count = components.storage.count_events(&contract.address).await?;

        println!("Contract: {}", contract.label());
        println!("Chain: {:?}", config.chain);
        println!("Events: {}", contract.events.join(", "));

        match state {
            Some(state) => {
                println!("Last synced block: {}", format_thousands(state.last_block));
                println!("Total events: {}", format_thousands(count));
                println!("Status: {}", state.status);
                println!("Last sync: {}", time_ago(state.last_sync));
            }
            None => {
                println!("Last synced block: (none yet)");
                println!("Total events: {}", format_thousands(count));
                println!("Status: pending");
            }
        }
        println!();
    }
    Ok(())
}

/// Renders a Unix timestamp as "N seconds/minutes/hours/days ago".
fn time_ago(unix_ts: i64) -> String {
    let now = Utc::now().timestamp();
    let elapsed = (now - unix_ts).max(0);

    if elapsed < 60 {
        format!("{elapsed} seconds ago")
    } else if elapsed < 3600 {
        format!("{} minutes ago", elapsed / 60)
    } else if elapsed < 86_400 {
        format!("{} hours ago", elapsed / 3600)
    } else {
        format!("{} days ago", elapsed / 86_400)
    }
}

/// Renders an integer with thousands separators, e.g. `19_000_050` →
/// `"19,000,050"`.
fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_thousands_matches_scenario() {
        assert_eq!(format_thousands(19_000_050), "19,000,050");
        assert_eq!(format_thousands(15_234), "15,234");
        assert_eq!(format_thousands(42), "42");
    }

    #[test]
    fn time_ago_buckets_correctly() {
        let now = Utc::now().timestamp();
        assert!(time_ago(now - 5).ends_with("seconds ago"));
        assert!(time_ago(now - 120).ends_with("minutes ago"));
        assert!(time_ago(now - 7200).ends_with("hours ago"));
        assert!(time_ago(now - 172_800).ends_with("days ago"));
    }
}
