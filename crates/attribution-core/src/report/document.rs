use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Instant;

use super::pdf::{Align, Font, PdfDocument};
use crate::analytics::returns::{annualise, mean, portfolio_series, return_statistics, sector_returns};
use crate::attribution::{brinson_attribution, AttributionOutput, AttributionRequest};
use crate::types::*;
use crate::AttributionResult;

const TITLE_SIZE: f64 = 24.0;
const HEADING_SIZE: f64 = 16.0;
const BODY_SIZE: f64 = 11.0;
const TABLE_SIZE: f64 = 9.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInput {
    pub fund_name: String,
    pub report_date: NaiveDate,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub risk_free_rate: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Paragraph { text: String },
    Bullets { items: Vec<String> },
    Table { headers: Vec<String>, rows: Vec<Vec<String>> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    /// Start the section on a fresh page
    pub new_page: bool,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub title: String,
    pub subtitle: String,
    pub report_date: NaiveDate,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub path: String,
    pub pages: usize,
    pub bytes: usize,
    pub sections: Vec<String>,
}

fn pct(value: Decimal, dp: u32) -> String {
    format!("{:.prec$}%", (value * dec!(100)).round_dp(dp), prec = dp as usize)
}

fn effect_verb(value: Decimal) -> &'static str {
    if value > Decimal::ZERO {
        "generated"
    } else {
        "lost"
    }
}

fn executive_summary(
    records: &[SectorRecord],
    attribution: &AttributionOutput,
    input: &ReportInput,
) -> AttributionResult<Section> {
    let series = portfolio_series(records)?;
    let stats = return_statistics(&series, input.risk_free_rate)?;
    let sectors = attribution.sector_attribution.len();

    let intro = format!(
        "This report presents a performance attribution analysis of the {} portfolio \
         from {} to {}. The portfolio is invested across {} sectors and is measured \
         against a sector benchmark over {} monthly periods.",
        input.fund_name,
        input.start_date,
        input.end_date,
        sectors,
        attribution.num_periods
    );
    let narrative = format!(
        "The attribution analysis shows that {} of active return was {} through sector \
         allocation decisions, while {} was {} through security selection within sectors.",
        pct(attribution.total_allocation.abs(), 2),
        effect_verb(attribution.total_allocation),
        pct(attribution.total_selection.abs(), 2),
        effect_verb(attribution.total_selection),
    );

    Ok(Section {
        heading: "Executive Summary".into(),
        new_page: false,
        blocks: vec![
            Block::Paragraph { text: intro },
            Block::Bullets {
                items: vec![
                    format!("Annualised Return: {}", pct(stats.annualised_return, 2)),
                    format!("Annualised Volatility: {}", pct(stats.annualised_volatility, 2)),
                    format!("Sharpe Ratio: {}", stats.sharpe_ratio.round_dp(3)),
                    format!(
                        "Total Active Return: {}",
                        pct(attribution.total_active_return, 2)
                    ),
                ],
            },
            Block::Paragraph { text: narrative },
        ],
    })
}

fn portfolio_composition(records: &[SectorRecord], attribution: &AttributionOutput) -> Section {
    let returns = sector_returns(records);
    let mut sectors = attribution.sector_attribution.clone();
    sectors.sort_by(|a, b| b.average_portfolio_weight.cmp(&a.average_portfolio_weight));
    let rows = sectors
        .iter()
        .map(|s| {
            let monthly = returns
                .get(&s.sector)
                .map(|r| mean(r))
                .unwrap_or(Decimal::ZERO);
            vec![
                s.sector.name().to_string(),
                pct(s.average_portfolio_weight, 1),
                pct(s.average_benchmark_weight, 1),
                s.periods.to_string(),
                annualise(monthly)
                    .map(|a| pct(a, 1))
                    .unwrap_or_else(|| "n/a".into()),
            ]
        })
        .collect();
    Section {
        heading: "Portfolio Composition".into(),
        new_page: false,
        blocks: vec![Block::Table {
            headers: ["Sector", "Avg. Weight", "Bench. Weight", "Periods", "Ann. Return"]
                .map(String::from)
                .to_vec(),
            rows,
        }],
    }
}

fn attribution_analysis(attribution: &AttributionOutput) -> Section {
    let mut blocks = vec![
        Block::Paragraph {
            text: "The Brinson-Fachler attribution model decomposes the portfolio's active \
                   return into three components:"
                .into(),
        },
        Block::Bullets {
            items: vec![
                format!(
                    "Allocation Effect ({}): return from over- or underweighting sectors \
                     relative to the benchmark.",
                    pct(attribution.total_allocation, 3)
                ),
                format!(
                    "Selection Effect ({}): return from holdings that out- or underperform \
                     their sector benchmark.",
                    pct(attribution.total_selection, 3)
                ),
                format!(
                    "Interaction Effect ({}): the joint effect of allocation and selection \
                     decisions.",
                    pct(attribution.total_interaction, 3)
                ),
                format!(
                    "Total Active Return: {}",
                    pct(attribution.total_active_return, 3)
                ),
            ],
        },
    ];
    if let Some(linked) = &attribution.linked {
        blocks.push(Block::Paragraph {
            text: format!(
                "Compounded over the period the portfolio returned {} against {} for the \
                 benchmark, an active return of {} after Carino linking.",
                pct(linked.compounded_portfolio_return, 2),
                pct(linked.compounded_benchmark_return, 2),
                pct(linked.compounded_active_return, 2)
            ),
        });
    }
    blocks.push(Block::Table {
        headers: ["Sector", "Portfolio Wt.", "Return", "Allocation", "Selection", "Interaction"]
            .map(String::from)
            .to_vec(),
        rows: attribution
            .sector_attribution
            .iter()
            .map(|s| {
                vec![
                    s.sector.name().to_string(),
                    pct(s.average_portfolio_weight, 1),
                    pct(s.average_portfolio_return, 2),
                    pct(s.allocation_effect, 3),
                    pct(s.selection_effect, 3),
                    pct(s.interaction_effect, 3),
                ]
            })
            .collect(),
    });
    Section {
        heading: "Performance Attribution Analysis".into(),
        new_page: true,
        blocks,
    }
}

fn conclusions(attribution: &AttributionOutput) -> Section {
    let best = attribution
        .sector_attribution
        .iter()
        .max_by(|a, b| a.total_effect.cmp(&b.total_effect));
    let worst = attribution
        .sector_attribution
        .iter()
        .min_by(|a, b| a.total_effect.cmp(&b.total_effect));
    let driver = if attribution.total_allocation.abs() >= attribution.total_selection.abs() {
        "Sector allocation decisions were the primary driver of active return"
    } else {
        "Security selection within sectors was the primary driver of active return"
    };

    let mut findings = vec![driver.to_string()];
    if let Some(b) = best {
        findings.push(format!(
            "{} made the largest contribution ({})",
            b.sector,
            pct(b.total_effect, 3)
        ));
    }
    if let Some(w) = worst {
        findings.push(format!(
            "{} detracted the most ({})",
            w.sector,
            pct(w.total_effect, 3)
        ));
    }

    Section {
        heading: "Conclusions & Recommendations".into(),
        new_page: true,
        blocks: vec![
            Block::Paragraph {
                text: "Key Findings:".into(),
            },
            Block::Bullets { items: findings },
            Block::Paragraph {
                text: "Recommendations:".into(),
            },
            Block::Bullets {
                items: vec![
                    "Continue monitoring commodity price exposure in the Mining sector".into(),
                    "Review underperforming holdings within high-allocation sectors".into(),
                    "Rebalance towards sectors with persistent positive selection".into(),
                    "Strengthen risk management for the most volatile sectors".into(),
                ],
            },
        ],
    }
}

/// Assemble the report sections from the records in the requested range.
pub fn build_report(
    records: &[SectorRecord],
    input: &ReportInput,
) -> AttributionResult<PerformanceReport> {
    let request = AttributionRequest::new(input.start_date, input.end_date);
    let attribution = brinson_attribution(records, &request)?.result;
    let in_range: Vec<SectorRecord> =
        crate::data::filter_range(records, input.start_date, input.end_date)
            .into_iter()
            .cloned()
            .collect();

    let sections = vec![
        executive_summary(&in_range, &attribution, input)?,
        portfolio_composition(&in_range, &attribution),
        attribution_analysis(&attribution),
        conclusions(&attribution),
    ];
    Ok(PerformanceReport {
        title: input.fund_name.clone(),
        subtitle: "Sectoral Investment Performance Attribution Report".into(),
        report_date: input.report_date,
        sections,
    })
}

fn column_widths(columns: usize, total: f64) -> Vec<f64> {
    if columns == 0 {
        return Vec::new();
    }
    let first = total * 0.25;
    let rest = (total - first) / (columns.saturating_sub(1).max(1)) as f64;
    std::iter::once(first)
        .chain(std::iter::repeat(rest).take(columns - 1))
        .collect()
}

impl PerformanceReport {
    pub fn render(&self) -> Vec<u8> {
        let mut doc = PdfDocument::new();

        doc.space(144.0);
        doc.text(&self.title, Font::Bold, TITLE_SIZE, Align::Center);
        doc.space(20.0);
        doc.text(&self.subtitle, Font::Bold, HEADING_SIZE, Align::Center);
        doc.space(36.0);
        doc.text(
            &format!("Report Date: {}", self.report_date.format("%B %d, %Y")),
            Font::Regular,
            BODY_SIZE,
            Align::Center,
        );
        doc.page_break();

        for section in &self.sections {
            if section.new_page {
                doc.page_break();
            }
            doc.text(&section.heading, Font::Bold, HEADING_SIZE, Align::Left);
            doc.space(6.0);
            for block in &section.blocks {
                match block {
                    Block::Paragraph { text } => {
                        doc.text(text, Font::Regular, BODY_SIZE, Align::Left);
                    }
                    Block::Bullets { items } => {
                        for item in items {
                            doc.text(&format!("- {item}"), Font::Regular, BODY_SIZE, Align::Left);
                        }
                    }
                    Block::Table { headers, rows } => {
                        let widths = column_widths(headers.len(), doc.content_width());
                        doc.row(headers, &widths, Font::Bold, TABLE_SIZE);
                        doc.rule(doc.content_width());
                        for row in rows {
                            doc.row(row, &widths, Font::Regular, TABLE_SIZE);
                        }
                    }
                }
                doc.space(8.0);
            }
            doc.space(12.0);
        }

        doc.to_bytes(&self.title, self.report_date)
    }
}

/// Build the report and write it as a PDF to `path`.
pub fn generate_report(
    records: &[SectorRecord],
    input: &ReportInput,
    path: &Path,
) -> AttributionResult<ComputationOutput<ReportSummary>> {
    let start = Instant::now();
    let report = build_report(records, input)?;
    let bytes = report.render();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;
    let pages = bytes
        .windows(b"/Type /Page ".len())
        .filter(|w| *w == b"/Type /Page ")
        .count();
    tracing::info!(path = %path.display(), pages, "wrote performance report");

    let summary = ReportSummary {
        path: path.display().to_string(),
        pages,
        bytes: bytes.len(),
        sections: report.sections.iter().map(|s| s.heading.clone()).collect(),
    };
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "PDF performance attribution report",
        &serde_json::json!({
            "page_size": "US Letter",
            "fonts": ["Helvetica", "Helvetica-Bold"],
            "report_date": input.report_date,
        }),
        Vec::new(),
        elapsed,
        summary,
    ))
}
