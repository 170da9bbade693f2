//! Terminal rendering for search results, assembled contexts, and ingest
//! reports.

use canlex_ingest::IngestReport;
use canlex_search::{AssembledContext, SearchResult};

pub fn print_ingest_report(report: &IngestReport) {
    println!("=== Ingest Report ===\n");
    println!("  Documents indexed: {:>6}", report.documents);
    if report.failed_documents > 0 {
        println!("  Documents failed:  {:>6}", report.failed_documents);
    }
    println!("  Resource rows:     {:>6}", report.resources);
    println!("  Embedding rows:    {:>6}", report.embeddings);
}

pub fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, result) in results.iter().enumerate() {
        let meta = &result.metadata;
        let title = meta.title.as_deref().unwrap_or("(untitled)");
        let location = meta
            .section_label
            .as_deref()
            .map(|l| format!(", s {l}"))
            .unwrap_or_default();
        println!(
            "{:>2}. [{:.3}] ({}) {title}{location} [{}]",
            i + 1,
            result.similarity,
            meta.source_type,
            meta.language,
        );
        if let Some(note) = &meta.marginal_note {
            println!("    {note}");
        }
        println!("    {}", snippet(&result.content, 160));
        println!("    {}", result.citation.url_en);
        if let Some(paired) = &result.paired_result {
            println!(
                "    ↳ paired [{}]: {}",
                paired.metadata.language,
                snippet(&paired.content, 100)
            );
        }
        println!();
    }
}

pub fn print_context(context: &AssembledContext) {
    println!("{}", context.prompt);
    if let Some(hydrated) = context.hydrated_sources.first() {
        println!("--- Hydrated source: {} ({}) ---", hydrated.title, hydrated.id);
        if let Some(note) = &hydrated.note {
            println!("> {note}");
        }
        println!("({} characters of markdown)", hydrated.markdown.len());
    }
}

fn snippet(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}…")
    }
}
