// src/report.rs

use crate::aggregator::Bucket;
use crate::cli::Args;
use crate::model::*;
use anyhow::{Context, Result};
use std::fmt::{self, Display, Write};
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub const REPORT_FILE: &str = "report.md";
pub const JSON_FILE: &str = "analysis.json";

/// Interpretive label for a correlation coefficient
pub fn alignment_label(coefficient: f64) -> &'static str {
    match coefficient.abs() {
        r if r > 0.7 => "Strong",
        r if r > 0.4 => "Moderate",
        _ => "Weak",
    }
}

/// Interpretive label for the share of ratings of 7 or more
pub fn rating_style(generous_share: f64) -> &'static str {
    match generous_share * 100.0 {
        pct if pct > 60.0 => "Very generous",
        pct if pct > 40.0 => "Moderately generous",
        _ => "Selective",
    }
}

/// Write the markdown report, and the JSON result when requested.
pub fn write_outputs(analysis: &AnalysisResult, args: &Args) -> Result<(PathBuf, String)> {
    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create output directory {:?}", args.output))?;

    let markdown = render_markdown(analysis).context("Failed to format report")?;
    let report_path = args.output.join(REPORT_FILE);
    fs::write(&report_path, &markdown).with_context(|| format!("Failed to write {:?}", report_path))?;
    info!("Wrote {}", report_path.display());

    if args.json {
        let json_path = args.output.join(JSON_FILE);
        let json = serde_json::to_string_pretty(analysis).context("Failed to serialize analysis")?;
        fs::write(&json_path, json).with_context(|| format!("Failed to write {:?}", json_path))?;
        info!("Wrote {}", json_path.display());
    }

    Ok((report_path, markdown))
}

pub fn render_markdown(analysis: &AnalysisResult) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let records = analysis.by_year.total_count();

    writeln!(out, "# IMDb Ratings Retrospective\n")?;
    writeln!(
        out,
        "Loaded {} of {} rows ({} rejected).\n",
        records,
        analysis.rows_read,
        analysis.rejected.len()
    )?;

    write_overview(&mut out, analysis)?;
    write_alignment(&mut out, analysis)?;
    write_years(&mut out, analysis)?;

    writeln!(out, "## Viewing eras\n")?;
    write_table(&mut out, records, "Era", analysis.by_era.buckets.iter())?;

    write_directors(&mut out, analysis)?;

    writeln!(out, "## Genres\n")?;
    let top = analysis.config.top;
    write_table(&mut out, records, "Genre", analysis.by_genre.rank_by_count().into_iter().take(top))?;
    writeln!(
        out,
        "Records with several genres count toward each of them ({} genre entries for {} records).\n",
        analysis.by_genre.contributions, records
    )?;

    writeln!(out, "## Content age\n")?;
    write_table(&mut out, records, "Age (years)", analysis.by_content_age.buckets.iter())?;
    writeln!(out, "## Runtime\n")?;
    write_table(&mut out, records, "Runtime (min)", analysis.by_runtime.buckets.iter())?;
    writeln!(out, "## Release decade\n")?;
    write_table(&mut out, records, "Decade", analysis.by_release_decade.buckets.iter())?;
    writeln!(out, "## Content type\n")?;
    write_table(&mut out, records, "Type", analysis.by_content_type.buckets.iter())?;

    if !analysis.rejected.is_empty() {
        writeln!(out, "## Rejected rows\n")?;
        for rejection in &analysis.rejected {
            writeln!(out, "- {}", rejection)?;
        }
        writeln!(out)?;
    }

    writeln!(
        out,
        "_Buckets marked * have fewer than {} ratings._",
        analysis.config.min_samples
    )?;
    Ok(out)
}

fn write_overview(out: &mut String, analysis: &AnalysisResult) -> fmt::Result {
    writeln!(out, "## Overview\n")?;
    let overall = match &analysis.overall {
        Ok(overall) => overall,
        Err(e) => return writeln!(out, "Unavailable: {}.\n", e),
    };

    writeln!(out, "- Total entries: {}", overall.count)?;
    for (content_type, count) in &overall.content_types {
        writeln!(out, "- {}: {} ({})", content_type, count, pct(*count as f64 / overall.count as f64))?;
    }
    writeln!(out, "- Average rating: {:.2}", overall.mean)?;
    if let Some(std_dev) = overall.std_dev {
        writeln!(out, "- Standard deviation: {:.2}", std_dev)?;
    }
    writeln!(out, "- Most common rating: {}", overall.mode)?;
    writeln!(out, "- Rated between {} and {}\n", overall.first_rated, overall.last_rated)?;

    writeln!(out, "### Rating distribution\n")?;
    writeln!(out, "| Rating | Count | Share |")?;
    writeln!(out, "|---|---|---|")?;
    for (i, &count) in overall.distribution.iter().enumerate().filter(|(_, count)| **count > 0) {
        writeln!(out, "| {}/10 | {} | {} |", i + 1, count, pct(count as f64 / overall.count as f64))?;
    }
    writeln!(out)?;
    writeln!(out, "- High ratings ({}+): {}", analysis.config.high_rating, pct(overall.high_share))?;
    writeln!(out, "- Low ratings (5 or less): {}", pct(overall.low_share))?;
    writeln!(
        out,
        "- Rating style: {} ({} of ratings are 7+)\n",
        rating_style(overall.generous_share),
        pct(overall.generous_share)
    )
}

fn write_alignment(out: &mut String, analysis: &AnalysisResult) -> fmt::Result {
    writeln!(out, "## Alignment with IMDb\n")?;
    match &analysis.correlation {
        Ok(c) => writeln!(
            out,
            "Correlation r = {:.3} over {} titles ({} alignment). Your ratings run {:+.2} points from IMDb on average.\n",
            c.coefficient,
            c.observations,
            alignment_label(c.coefficient),
            c.mean_offset
        ),
        Err(e) => writeln!(out, "Unavailable: {}.\n", e),
    }
}

fn write_years(out: &mut String, analysis: &AnalysisResult) -> fmt::Result {
    writeln!(out, "## Year by year\n")?;
    if analysis.yearly.is_empty() {
        return writeln!(out, "No ratings.\n");
    }

    writeln!(out, "| Year | Era | Ratings | Total | Avg | Std | Avg IMDb | Content age | High % |")?;
    writeln!(out, "|---|---|---|---|---|---|---|---|---|")?;
    for (point, bucket) in analysis.yearly.iter().zip(&analysis.by_year.buckets) {
        writeln!(
            out,
            "| {}{} | {} | {} | {} | {:.2} | {} | {} | {:.1} | {:.1} |",
            point.year,
            marker(bucket),
            point.era.map(|e| e.to_string()).unwrap_or_default(),
            bucket.count,
            point.cumulative_count,
            bucket.mean_rating,
            opt(bucket.rating_std_dev),
            opt(bucket.mean_reference),
            point.mean_content_age,
            point.generosity_pct
        )?;
    }
    writeln!(out)?;

    if let Some(peak) = analysis.by_year.rank_by_count().first() {
        writeln!(out, "- Peak volume year: {} ({} ratings)", peak.key, peak.count)?;
    }
    if let Some(peak) = analysis.by_year.rank_by_mean().first() {
        writeln!(out, "- Peak quality year: {} ({:.2} avg)", peak.key, peak.mean_rating)?;
    }
    writeln!(out)
}

fn write_directors(out: &mut String, analysis: &AnalysisResult) -> fmt::Result {
    writeln!(out, "## Favorite directors\n")?;
    match &analysis.top_directors {
        Ok(names) => {
            let buckets = names.iter().filter_map(|name| analysis.by_director.get(name));
            write_table(out, analysis.by_year.total_count(), "Director", buckets)
        }
        Err(e) => writeln!(out, "Unavailable: {}.\n", e),
    }
}

/// `records` is the number of loaded records; Share is each bucket's
/// fraction of them, so multi-valued groupings can sum past 100%.
fn write_table<'a, K: Display + 'a>(
    out: &mut String,
    records: usize,
    heading: &str,
    buckets: impl Iterator<Item = &'a Bucket<K>>,
) -> fmt::Result {
    writeln!(out, "| {} | Count | Share | Avg | Avg IMDb | High % | Last rated |", heading)?;
    writeln!(out, "|---|---|---|---|---|---|---|")?;
    for bucket in buckets {
        writeln!(
            out,
            "| {}{} | {} | {} | {:.2} | {} | {:.1} | {} |",
            bucket.key,
            marker(bucket),
            bucket.count,
            pct(bucket.count as f64 / records.max(1) as f64),
            bucket.mean_rating,
            opt(bucket.mean_reference),
            bucket.high_rating_share * 100.0,
            bucket.latest_rated.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
        )?;
    }
    writeln!(out)
}

fn marker<K>(bucket: &Bucket<K>) -> &'static str {
    if bucket.low_confidence {
        "*"
    } else {
        ""
    }
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn pct(share: f64) -> String {
    format!("{:.1}%", share * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::run;
    use crate::config::AnalysisConfig;
    use crate::error::MalformedRecordError;
    use crate::loader::LoadOutcome;
    use crate::model::fixtures::*;
    use clap::Parser;

    fn analysis() -> AnalysisResult {
        let records = vec![
            with_reference(with_genres(with_directors(rated(2001, 9), &["Ann"]), &["Drama", "Action"]), 8.0),
            with_reference(with_genres(with_directors(rated(2001, 8), &["Ann"]), &["Drama"]), 7.4),
            with_reference(with_genres(with_directors(rated(2002, 5), &["Ann"]), &["Comedy"]), 6.0),
        ];
        let rejected = vec![MalformedRecordError::missing(3, "Your Rating")];
        let config = AnalysisConfig { reference_year: 2025, ..AnalysisConfig::default() };
        run(LoadOutcome { records, rejected }, 4, &config)
    }

    #[test]
    fn test_labels() {
        assert_eq!(alignment_label(0.85), "Strong");
        assert_eq!(alignment_label(-0.5), "Moderate");
        assert_eq!(alignment_label(0.4), "Weak");
        assert_eq!(rating_style(0.61), "Very generous");
        assert_eq!(rating_style(0.5), "Moderately generous");
        assert_eq!(rating_style(0.4), "Selective");
    }

    #[test]
    fn test_markdown_sections() {
        let markdown = render_markdown(&analysis()).unwrap();
        assert!(markdown.contains("Loaded 3 of 4 rows (1 rejected)."));
        assert!(markdown.contains("- Most common rating: 5"));
        assert!(markdown.contains("| 2001* | consumption | 2 | 2 | 8.50 |"));
        assert!(markdown.contains("- Peak volume year: 2001 (2 ratings)"));
        assert!(markdown.contains("| Ann | 3 | 100.0% | 7.33 | 7.13 | 66.7 | 2002-01-01 |"));
        assert!(markdown.contains("| Drama* | 2 | 66.7% | 8.50 |"));
        assert!(markdown.contains("| Action* | 1 | 33.3% | 9.00 |"));
        assert!(markdown.contains("(4 genre entries for 3 records)"));
        assert!(markdown.contains("- row 3: field `Your Rating` is missing"));
        assert!(markdown.contains("Strong alignment"));
    }

    #[test]
    fn test_missing_statistics_are_explained() {
        let config = AnalysisConfig::default();
        let empty = run(LoadOutcome::default(), 0, &config);
        let markdown = render_markdown(&empty).unwrap();
        assert!(markdown.contains("Unavailable: overall statistics: 0 observation(s), at least 1 required."));
        assert!(markdown.contains("Unavailable: rating correlation: 0 observation(s), at least 2 required."));
        assert!(markdown.contains("Unavailable: top by mean rating [director]"));
    }

    #[test]
    fn test_write_outputs_with_json() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::parse_from([
            "imdb-retrospect",
            "--input",
            "ratings.csv",
            "--output",
            dir.path().to_str().unwrap(),
            "--json",
        ]);
        let (path, markdown) = write_outputs(&analysis(), &args).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), markdown);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join(JSON_FILE)).unwrap()).unwrap();
        assert_eq!(json["by_year"]["buckets"][0]["count"], 2);
        assert_eq!(json["correlation"]["Ok"]["observations"], 3);
        assert_eq!(json["overall"]["Ok"]["content_types"]["Movie"], 3);
    }
}
