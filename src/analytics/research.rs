//! Research impact calculations.
//!
//! Stateless functions over the paper sample fetched from the paper-search
//! API; no I/O.

use std::collections::{BTreeMap, HashMap};

use crate::analytics::metrics::round_to;
use crate::models::{CitationYear, PublicationTypeCount, TopPaper, VenueCount};
use crate::repositories::rows::Paper;

/// h-index: the largest h such that h papers have at least h citations each.
pub fn h_index(citations: &[i64]) -> i64 {
    let mut sorted: Vec<i64> = citations.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let mut h = 0;
    for (i, &c) in sorted.iter().enumerate() {
        if c >= (i + 1) as i64 {
            h = (i + 1) as i64;
        } else {
            break;
        }
    }
    h
}

/// Citations and paper counts per publication year, ascending.
pub fn citation_trend(papers: &[Paper]) -> Vec<CitationYear> {
    let mut by_year: BTreeMap<i32, (i64, i64)> = BTreeMap::new();
    for paper in papers {
        let Some(year) = paper.year else { continue };
        let entry = by_year.entry(year).or_default();
        entry.0 += paper.citation_count.unwrap_or(0);
        entry.1 += 1;
    }
    by_year
        .into_iter()
        .map(|(year, (citations, paper_count))| CitationYear { year, citations, paper_count })
        .collect()
}

/// Top-N papers by citation count.
pub fn top_papers(papers: &[Paper], top_n: usize) -> Vec<TopPaper> {
    let mut sorted: Vec<&Paper> = papers.iter().collect();
    sorted.sort_by(|a, b| {
        b.citation_count
            .unwrap_or(0)
            .cmp(&a.citation_count.unwrap_or(0))
            .then_with(|| a.title.cmp(&b.title))
    });

    sorted
        .into_iter()
        .take(top_n)
        .map(|paper| {
            let authors = &paper.authors;
            let mut authors_short = authors
                .iter()
                .take(3)
                .map(|a| a.name.clone())
                .collect::<Vec<_>>()
                .join(", ");
            if authors.len() > 3 {
                authors_short.push_str(" et al.");
            }
            TopPaper {
                title: paper.title.clone(),
                venue: paper.venue.clone().unwrap_or_default(),
                year: paper.year.unwrap_or(0),
                citations: paper.citation_count.unwrap_or(0),
                authors_short,
            }
        })
        .collect()
}

/// Top venues by paper count, with their share of the venue-attributed total.
pub fn venue_distribution(papers: &[Paper], top_n: usize) -> Vec<VenueCount> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for paper in papers {
        if let Some(venue) = paper.venue.as_deref() {
            if !venue.is_empty() {
                *counts.entry(venue.to_string()).or_default() += 1;
            }
        }
    }

    let total: i64 = counts.values().sum();
    let mut sorted: Vec<(String, i64)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    sorted
        .into_iter()
        .take(top_n)
        .map(|(venue, count)| VenueCount {
            venue,
            count,
            share: if total > 0 { round_to(count as f64 / total as f64, 4) } else { 0.0 },
        })
        .collect()
}

/// Publication type counts, most frequent first.
pub fn publication_types(papers: &[Paper]) -> Vec<PublicationTypeCount> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for paper in papers {
        for pub_type in paper.publication_types.iter().flatten() {
            if !pub_type.is_empty() {
                *counts.entry(pub_type.clone()).or_default() += 1;
            }
        }
    }

    let mut sorted: Vec<(String, i64)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
        .into_iter()
        .map(|(publication_type, count)| PublicationTypeCount { publication_type, count })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::rows::PaperAuthor;

    fn paper(title: &str, year: i32, citations: i64) -> Paper {
        Paper {
            title: title.to_string(),
            year: Some(year),
            citation_count: Some(citations),
            influential_citation_count: Some(0),
            venue: Some("Test Venue".to_string()),
            authors: vec![PaperAuthor { name: "A. Author".to_string() }],
            fields_of_study: None,
            publication_types: Some(vec!["JournalArticle".to_string()]),
            reference_count: Some(0),
        }
    }

    #[test]
    fn h_index_textbook_cases() {
        assert_eq!(h_index(&[10, 8, 5, 4, 3]), 4);
        assert_eq!(h_index(&[25, 8, 5, 3, 3]), 3);
        assert_eq!(h_index(&[0, 0, 0]), 0);
        assert_eq!(h_index(&[]), 0);
        assert_eq!(h_index(&[1]), 1);
    }

    #[test]
    fn citation_trend_is_ascending_by_year() {
        let papers =
            vec![paper("a", 2021, 5), paper("b", 2019, 3), paper("c", 2021, 2)];
        let trend = citation_trend(&papers);
        assert_eq!(trend.len(), 2);
        assert_eq!(trend[0].year, 2019);
        assert_eq!(trend[1].year, 2021);
        assert_eq!(trend[1].citations, 7);
        assert_eq!(trend[1].paper_count, 2);
    }

    #[test]
    fn top_papers_sorted_and_truncated() {
        let papers = vec![paper("low", 2020, 1), paper("high", 2020, 50), paper("mid", 2020, 10)];
        let top = top_papers(&papers, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].title, "high");
        assert_eq!(top[1].title, "mid");
    }

    #[test]
    fn author_list_abbreviated_after_three() {
        let mut p = paper("many authors", 2020, 5);
        p.authors = (1..=5)
            .map(|i| PaperAuthor { name: format!("Author {}", i) })
            .collect();
        let top = top_papers(&[p], 1);
        assert!(top[0].authors_short.ends_with("et al."));
        assert!(top[0].authors_short.starts_with("Author 1, Author 2, Author 3"));
    }

    #[test]
    fn venue_shares_sum_to_one_for_single_venue() {
        let papers = vec![paper("a", 2020, 1), paper("b", 2020, 2)];
        let venues = venue_distribution(&papers, 8);
        assert_eq!(venues.len(), 1);
        assert_eq!(venues[0].count, 2);
        assert_eq!(venues[0].share, 1.0);
    }

    #[test]
    fn publication_types_counted() {
        let papers = vec![paper("a", 2020, 1), paper("b", 2021, 2)];
        let types = publication_types(&papers);
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].publication_type, "JournalArticle");
        assert_eq!(types[0].count, 2);
    }
}
