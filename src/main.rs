mod detect;
mod fingerprint;
mod model;
mod reconcile;
mod sourcemap;
mod storage;
mod validate;

use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::error::Error;

use detect::patterns::{self, PatternSpec};
use detect::pipeline::{self, ScanOutcome};
use model::{Finding, Validity};
use reconcile::FindingStore;
use storage::JsonFileStorage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();

    let backend = match std::env::var("LEAKWATCH_STORE") {
        Ok(path) => JsonFileStorage::at(path.into()),
        Err(_) => JsonFileStorage::new(),
    };
    let client = pipeline::http_client();
    let mut store = FindingStore::load(&backend).await;
    let custom = patterns::load_custom_patterns(&backend).await;

    // ==============================
    // 🔎 DIRECT COMMAND MODE
    // ==============================
    match args.get(1).map(String::as_str) {
        Some("scan") => {
            let Some(page_url) = args.get(2) else {
                println!("Usage: leakwatch scan <page-url>");
                return Ok(());
            };
            scan_page(&client, &mut store, page_url, &custom).await;
            return Ok(());
        }
        Some("scan-bundle") => {
            let Some(bundle_url) = args.get(2) else {
                println!("Usage: leakwatch scan-bundle <bundle-url>");
                return Ok(());
            };
            scan_bundle(&client, &mut store, bundle_url, &custom).await;
            return Ok(());
        }
        Some("list") => {
            let tab = args.get(2).map(String::as_str).unwrap_or("all");
            list_findings(&mut store, tab).await;
            return Ok(());
        }
        Some("recheck") => {
            recheck_findings(&client, &mut store).await;
            return Ok(());
        }
        Some("delete") => {
            let Some(prefix) = args.get(2) else {
                println!("Usage: leakwatch delete <fingerprint-prefix>");
                return Ok(());
            };
            delete_finding(&mut store, prefix).await?;
            return Ok(());
        }
        Some("add-pattern") => {
            let (Some(name), Some(source)) = (args.get(2), args.get(3)) else {
                println!("Usage: leakwatch add-pattern <name> <regex> [--first-only]");
                return Ok(());
            };
            let global = !args.iter().any(|a| a == "--first-only");
            add_pattern(&backend, custom, name, source, global).await?;
            return Ok(());
        }
        Some(other) => {
            println!("❌ Unknown command: {}", other);
            return Ok(());
        }
        None => {}
    }

    // ==============================
    // 🎛 INTERACTIVE MENU LOOP
    // ==============================
    loop {
        let choice = display_menu()?;

        match choice {
            0 => {
                let page_url: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Page URL to scan")
                    .interact_text()?;
                scan_page(&client, &mut store, &page_url, &custom).await;
            }
            1 => {
                let bundle_url: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Bundle URL to scan")
                    .interact_text()?;
                scan_bundle(&client, &mut store, &bundle_url, &custom).await;
            }
            2 => list_findings(&mut store, "all").await,
            3 => recheck_findings(&client, &mut store).await,
            4 => {
                let prefix: String = Input::with_theme(&ColorfulTheme::default())
                    .with_prompt("Fingerprint prefix to delete")
                    .interact_text()?;
                delete_finding(&mut store, &prefix).await?;
            }
            5 => {
                println!("👋 Goodbye!");
                break;
            }
            _ => println!("❌ Invalid choice."),
        }
    }

    Ok(())
}

fn display_menu() -> Result<usize, Box<dyn Error>> {
    println!("\n{}", "=".repeat(80));
    println!("🔦 LeakWatch - Bundle Secret Scanner");
    println!("{}", "=".repeat(80));

    let items = vec![
        "🔎 Scan a Page (and its Script Bundles)",
        "📦 Scan a Single Bundle URL",
        "📋 List Findings",
        "♻️  Recheck All Findings",
        "🗑 Delete a Finding",
        "❌ Quit",
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose an option")
        .items(&items)
        .default(0)
        .interact()?;

    Ok(selection)
}

// ==============================
// 🔎 Scan Commands
// ==============================

async fn scan_page(
    client: &reqwest::Client,
    store: &mut FindingStore<&JsonFileStorage>,
    page_url: &str,
    custom: &[PatternSpec],
) {
    println!("🔎 Scanning page {} ...\n", page_url);
    match pipeline::scan_page(client, store, page_url, custom).await {
        Ok(outcome) => report_outcome(&outcome),
        Err(e) => println!("❌ Scan failed: {}", e),
    }
}

async fn scan_bundle(
    client: &reqwest::Client,
    store: &mut FindingStore<&JsonFileStorage>,
    bundle_url: &str,
    custom: &[PatternSpec],
) {
    println!("📦 Scanning bundle {} ...\n", bundle_url);
    match pipeline::scan_bundle(client, store, bundle_url, bundle_url, custom).await {
        Ok(outcome) => report_outcome(&outcome),
        Err(e) => println!("❌ Scan failed: {}", e),
    }
}

fn report_outcome(outcome: &ScanOutcome) {
    let new_findings = outcome.new_findings.to_string();
    println!(
        "✅ Scanned {} bundle(s): {} new finding(s), {} total.",
        outcome.bundles_scanned,
        new_findings.as_str().bold(),
        outcome.total_findings
    );
    if outcome.new_findings > 0 {
        println!("   Run `leakwatch list` to inspect them.");
    }
}

// ==============================
// 📋 Listing
// ==============================

async fn list_findings(store: &mut FindingStore<&JsonFileStorage>, tab: &str) {
    store.set_active_tab(tab).await;

    let shown: Vec<Finding> = store
        .findings()
        .iter()
        .filter(|f| match tab {
            "valid" => f.validity == Validity::Valid,
            "invalid" => f.validity == Validity::Invalid,
            _ => true,
        })
        .cloned()
        .collect();

    if shown.is_empty() {
        println!("✅ No findings recorded.");
        return;
    }

    for finding in &shown {
        print_finding(finding);
    }
    println!("\n{} finding(s) shown.", shown.len());

    store.mark_all_seen().await;
}

fn print_finding(finding: &Finding) {
    let validity = match finding.validity {
        Validity::Valid => finding.validity.label().red().bold(),
        Validity::Invalid => finding.validity.label().dimmed(),
        _ => finding.validity.label().yellow(),
    };
    let new_marker = if finding.is_new { " 🆕" } else { "" };

    println!(
        "\n🔑 {} [{}]{}",
        finding.secret_type.as_str().bold(),
        validity,
        new_marker
    );
    println!(
        "    fingerprint: {}",
        &finding.fingerprint[..16.min(finding.fingerprint.len())]
    );
    println!("    secret:      {}", finding.secret_value.redacted());
    println!("    occurrences: {}", finding.num_occurrences);
    for occurrence in finding.occurrences.iter() {
        println!("      - {} ({})", occurrence.url, occurrence.file_path);
    }

    if let Some(source) = finding.occurrences.iter().next().map(|o| &o.source_content) {
        if source.content_start_line_num >= 0 {
            println!(
                "    source:      {} lines {}-{}",
                source.content_filename, source.content_start_line_num, source.content_end_line_num
            );
        }
    }
    if let Some(discovered_at) = finding.discovered_at {
        println!(
            "    discovered:  {}",
            discovered_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    if let Some(validated_at) = finding.validated_at {
        println!(
            "    checked:     {}",
            validated_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
}

// ==============================
// ♻️  Recheck
// ==============================

async fn recheck_findings(client: &reqwest::Client, store: &mut FindingStore<&JsonFileStorage>) {
    let total = store.findings().len();
    if total == 0 {
        println!("✅ Nothing to recheck.");
        return;
    }

    println!("♻️  Rechecking {} finding(s)...\n", total);
    validate::recheck_all(client, store, |done, total| {
        println!("    [{}/{}] checked", done, total);
    })
    .await;

    let still_valid = store
        .findings()
        .iter()
        .filter(|f| f.validity == Validity::Valid)
        .count();
    println!("\n✅ Recheck complete: {} still valid.", still_valid);
}

// ==============================
// 🗑 Deletion
// ==============================

async fn delete_finding(
    store: &mut FindingStore<&JsonFileStorage>,
    prefix: &str,
) -> Result<(), Box<dyn Error>> {
    let matches: Vec<(String, String)> = store
        .findings()
        .iter()
        .filter(|f| f.fingerprint.starts_with(prefix))
        .map(|f| (f.fingerprint.clone(), f.secret_type.clone()))
        .collect();

    match matches.len() {
        0 => println!("❌ No finding matches '{}'.", prefix),
        1 => {
            let (fingerprint, secret_type) = &matches[0];
            let confirmed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt(format!(
                    "Delete {} ({}…)?",
                    secret_type,
                    &fingerprint[..16.min(fingerprint.len())]
                ))
                .default(false)
                .interact()?;
            if confirmed {
                if store.remove_finding(fingerprint).await {
                    println!("✔ Finding deleted.");
                } else {
                    println!("❌ Finding could not be removed.");
                }
            }
        }
        n => println!(
            "❌ '{}' is ambiguous ({} matches) — use a longer prefix.",
            prefix, n
        ),
    }
    Ok(())
}

// ==============================
// 🔧 Pattern Registry
// ==============================

async fn add_pattern(
    backend: &JsonFileStorage,
    mut custom: Vec<PatternSpec>,
    name: &str,
    source: &str,
    global: bool,
) -> Result<(), Box<dyn Error>> {
    let spec = PatternSpec::new(name, source, global)?;
    custom.retain(|existing| existing.name != spec.name);
    custom.push(spec);
    patterns::save_custom_patterns(backend, &custom).await;
    println!(
        "✔ Pattern '{}' saved ({}).",
        name,
        if global { "all matches" } else { "first match only" }
    );
    Ok(())
}
