// src/analysis/prompt.rs
use once_cell::sync::Lazy;
use regex::Regex;

/// Exact reply requested from the model when the document is not a financial report.
pub const NOT_FINANCIAL_SENTINEL: &str = "The uploaded PDF does not appear to be a financial report.";

static NOT_FINANCIAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)does\s+not\s+appear\s+to\s+be\s+a\s+financial\s+report")
        .expect("Failed to compile NOT_FINANCIAL_RE")
});

/// True when the model signalled non-financial input instead of answering with data.
pub fn is_not_financial(response: &str) -> bool {
    NOT_FINANCIAL_RE.is_match(response)
}

pub fn instruction() -> String {
    format!("{}{}{}", PREAMBLE, NOT_FINANCIAL_SENTINEL, EXTRACTION_BODY)
}

const PREAMBLE: &str = r#"FIRST, analyze the entire document to determine if it represents a company's financial report. Check for:
- Sections titled "Financial Results", "Income Statement", "Balance Sheet" or similar
- Presence of financial tables with metrics like Revenue, Profit, Expenses
- Common financial terms (EBITDA, EPS, Assets, Liabilities, etc.)
- Numerical data with currency units

If the document DOES NOT contain financial results or appears unrelated to company financials, respond ONLY with: ""#;

const EXTRACTION_BODY: &str = r#""

ONLY IF financial content is confirmed, proceed with:
Analyze the quarterly result PDF and extract the consolidated financial metrics.

1. Core Financial Performance, from the section titled "STATEMENT OF CONSOLIDATED UNAUDITED FINANCIAL RESULTS" or similar:
   - Total Revenue/Income from Operations
   - Total Income (including other income)
   - Total Expenses / Total Expenditure / Total Cost
   - Total Tax Expense
   - Profit/ (Loss) Before Tax (PBT)
   - Net Profit/ (Loss) or (Profit After Tax)
   - Basic EPS
   - Diluted EPS
2. Other Disclosures, from the section titled "Other Disclosures - Consolidated":
   - Operating Profit Margin (%)
   - Net Profit Margin (%)
   - Debt equity ratio (in times)
   - Total debts to total assets ratio (in %)
3. Balance Sheet Highlights, from the section titled "Consolidated Statement of Assets and Liabilities":
   - Total Assets
   - Total Liabilities
   - Net Worth
   - Debt

Important Instructions:
1. ONLY extract data from the CONSOLIDATED tables, never standalone
2. Focus on current quarter figures ONLY (not year-to-date/annual)
3. Include units (e.g., INR in Crores)
4. Set value to null for unavailable metrics, but keep every key

Return in this JSON format:
{
    "quarter": "Q# FY##",
    "date": "YYYY-MM-DD",
    "metrics": {
        "core_financials": {
            "revenue": {"value": number, "unit": "string"},
            "total_income": {"value": number, "unit": "string"},
            "total_expenses": {"value": number, "unit": "string"},
            "total_tax_expense": {"value": number, "unit": "string"},
            "profit_before_tax": {"value": number, "unit": "string"},
            "net_profit": {"value": number, "unit": "string"},
            "basic_eps": {"value": number, "unit": "INR"},
            "diluted_eps": {"value": number, "unit": "INR"}
        },
        "other_disclosures": {
            "operating_margin": {"value": number, "unit": "%"},
            "net_margin": {"value": number, "unit": "%"},
            "total_debt_to_asset_ratio": {"value": number, "unit": "%"},
            "debt_equity_ratio": {"value": number, "unit": "times"}
        },
        "balance_sheet": {
            "total_assets": {"value": number, "unit": "string"},
            "total_liabilities": {"value": number, "unit": "string"},
            "net_worth": {"value": number, "unit": "string"},
            "debt": {"value": number, "unit": "string"}
        }
    }
}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_embeds_sentinel_and_schema() {
        let text = instruction();
        assert!(text.contains(&format!("respond ONLY with: \"{}\"", NOT_FINANCIAL_SENTINEL)));
        for key in ["core_financials", "other_disclosures", "balance_sheet", "diluted_eps"] {
            assert!(text.contains(key), "missing {key}");
        }
    }

    #[test]
    fn sentinel_detection_ignores_case_and_spacing() {
        assert!(is_not_financial(NOT_FINANCIAL_SENTINEL));
        assert!(is_not_financial("Sorry.\nThis document does not  appear to be a Financial Report"));
        assert!(!is_not_financial("{\"quarter\": \"Q2 FY25\"}"));
    }
}
