//! `vqa classify` and `vqa extract`: the deterministic pipeline stages,
//! printed without involving a formatter.

use anyhow::Result;
use vaultqa_core::assemble::{assemble, Assembly};
use vaultqa_core::classify::classify;
use vaultqa_core::index::VaultIndex;
use vaultqa_core::retrieve::RetrievalParams;
use vaultqa_core::vocab::Lexicon;

pub fn run_classify(index: &VaultIndex, lexicon: &Lexicon, query: &str, json: bool) -> Result<()> {
    let class = classify(query, index, lexicon);
    if json {
        let value = serde_json::json!({ "route": class.route(), "class": class });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("route:                 {}", class.route());
    println!("identity:              {}", class.is_identity);
    println!("info_seeking:          {}", class.is_info_seeking);
    println!("price_query:           {}", class.is_price_query);
    println!("count_query:           {}", class.is_count_query);
    println!("references_known_term: {}", class.references_known_term);
    Ok(())
}

pub fn run_extract(
    index: &VaultIndex,
    lexicon: &Lexicon,
    params: &RetrievalParams,
    query: &str,
    json: bool,
) -> Result<()> {
    let assembly = assemble(query, index, lexicon, params);
    if json {
        println!("{}", serde_json::to_string_pretty(&assembly)?);
        return Ok(());
    }

    match &assembly {
        Assembly::Facts(sheet) => {
            println!("route:     {}", sheet.route);
            println!("extractor: {}", sheet.extractor);
            println!("records:   {}", sheet.records.len());
            println!();
            for (i, record) in sheet.records.iter().enumerate() {
                let kind = serde_json::to_value(record.kind())?;
                let confidence = serde_json::to_value(record.confidence)?;
                println!(
                    "[{}] {} ({}, {})",
                    i + 1,
                    record.summary(),
                    kind.as_str().unwrap_or_default(),
                    confidence.as_str().unwrap_or_default()
                );
                println!("    {}", record.source);
            }
        }
        Assembly::SmallTalk => println!("outcome: small-talk (no facts)"),
        other => {
            println!("outcome: {}", other.outcome());
            if let Some(reply) = other.canned_reply() {
                println!("{}", reply);
            }
        }
    }
    Ok(())
}
