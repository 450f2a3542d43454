use crate::analyzer::SearchOutcome;
use crate::dataset::DatasetStats;
use crate::models::SearchResult;
use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use std::path::Path;

fn optional<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

pub fn results_table(results: &[SearchResult]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "#", "College", "Code", "Branch", "Cutoff", "Category", "Gender", "Type", "Place", "Fee",
        ]);

    for (i, result) in results.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            result.name.clone(),
            result.inst_code.clone(),
            format!("{} ({})", result.branch, result.branch_code),
            result.cutoff_rank.to_string(),
            result.category.to_string(),
            result.gender.as_str().to_string(),
            result.college_type.clone(),
            result.place.clone(),
            result.tuition_fee.to_string(),
        ]);
    }
    table
}

pub fn print_search_outcome(rank: u32, outcome: &SearchOutcome) {
    println!(
        "🔍 Rank {}: looking at cutoffs between {} and {}",
        rank, outcome.window.lower_bound, outcome.window.upper_bound
    );
    if outcome.results.is_empty() {
        println!("❌ No colleges found near this rank");
        return;
    }
    println!("{}", results_table(&outcome.results));
    println!("✅ {} matches", outcome.count);
}

pub fn write_results_csv(results: &[SearchResult], path: &Path) -> Result<()> {
    use csv::Writer;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = Writer::from_path(path)?;

    writer.write_record([
        "Institute Name",
        "Inst Code",
        "Branch",
        "Branch Code",
        "Cutoff Rank",
        "Category",
        "Gender",
        "Tuition Fee",
        "Affiliated To",
        "College Type",
        "Co Education",
        "Place",
        "Year of Estab",
        "Website",
        "Facilities",
        "Seats",
        "Duration",
    ])?;

    for result in results {
        writer.write_record(&[
            result.name.clone(),
            result.inst_code.clone(),
            result.branch.clone(),
            result.branch_code.clone(),
            result.cutoff_rank.to_string(),
            result.category.to_string(),
            result.gender.as_str().to_string(),
            result.tuition_fee.to_string(),
            result.affiliated_to.clone(),
            result.college_type.clone(),
            result.co_ed.clone(),
            result.place.clone(),
            result.year_established.to_string(),
            result.website.clone(),
            result.facilities.clone(),
            optional(&result.seats),
            optional(&result.duration),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn print_stats(stats: &DatasetStats) {
    println!("📊 Colleges data");
    println!("   Total colleges: {}", stats.total_colleges);
    println!("   Total branches: {}", stats.total_branches);
    println!("   Data entries:   {}", stats.data_entries);
}

pub fn print_options(branch_names: &[String], college_types: &[String]) {
    let categories: Vec<&str> = crate::categories::Category::ALL
        .iter()
        .map(|c| c.name())
        .collect();
    println!("Categories: {}", categories.join(", "));
    println!("College types: {}", college_types.join(", "));
    println!("Branches:");
    for branch in branch_names {
        println!("   - {}", branch);
    }
}
