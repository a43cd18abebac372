//! Plain-text rendering of evaluations for terminal output.

use rate_core::{Evaluation, RateTable};

/// One line per band reached, then the total.
///
/// ```text
/// salary-tax [2022-03-21, 2023-03-21) amount 1000000000
///   0–672000000 @ 0%                    portion 672000000     levy 0
///   672000000–1800000000 @ 10%          portion 328000000     levy 32800000
///   total 32800000 (effective rate 3.28%)
/// ```
pub fn format_evaluation(
    table: &RateTable,
    evaluation: &Evaluation,
) -> String {
    let mut out = format!(
        "{} {} amount {}\n",
        table.name(),
        table.period(),
        evaluation.amount
    );

    for levy in &evaluation.breakdown {
        out.push_str(&format!(
            "  {:<34} portion {:<14} levy {}\n",
            levy.band.to_string(),
            levy.taxed_portion,
            levy.levied_amount
        ));
    }

    let total = match evaluation.effective_rate() {
        Some(rate) => format!(
            "  total {} (effective rate {}%)\n",
            evaluation.total,
            rate.round_dp(2).normalize()
        ),
        None => format!("  total {}\n", evaluation.total),
    };
    out.push_str(&total);

    out
}

/// Summary line per table: name, period and band count.
pub fn format_table_summary(table: &RateTable) -> String {
    format!(
        "{} {} ({} bands, top rate {}%)",
        table.name(),
        table.period(),
        table.bands().len(),
        table.terminal_band().rate
    )
}
