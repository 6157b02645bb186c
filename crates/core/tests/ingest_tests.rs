// ═══════════════════════════════════════════════════════════════════
// Ingestion Tests: spreadsheet parsing, header matching, row
// validation, format and size gates
// ═══════════════════════════════════════════════════════════════════

use portfolio_insight_core::errors::CoreError;
use portfolio_insight_core::ingest::{parse_holdings, MAX_UPLOAD_BYTES, REQUIRED_COLUMNS};

const GOOD_CSV: &str = "\
Symbol,Sector,Quantity Available,Average Price,Previous Closing Price
RELIANCE,Energy,10,2500,2600
TCS,IT,5,3200,3100
INFY,IT,8,1500,1450
";

fn expect_validation(result: Result<impl std::fmt::Debug, CoreError>) -> String {
    match result {
        Err(CoreError::ValidationError(msg)) => msg,
        Err(other) => panic!("Expected ValidationError, got {:?}", other),
        Ok(ok) => panic!("Expected ValidationError, got Ok({:?})", ok),
    }
}

// ── Happy path ──────────────────────────────────────────────────────

mod parsing {
    use super::*;

    #[test]
    fn parses_well_formed_csv() {
        let table = parse_holdings(GOOD_CSV.as_bytes(), "holdings.csv").unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[0].ticker, "RELIANCE");
        assert_eq!(table.rows[0].sector.as_deref(), Some("Energy"));
        assert_eq!(table.rows[0].quantity, 10.0);
        assert_eq!(table.rows[0].average_price, 2500.0);
        assert_eq!(table.rows[0].previous_close, 2600.0);
    }

    #[test]
    fn preserves_upload_order() {
        let table = parse_holdings(GOOD_CSV.as_bytes(), "holdings.csv").unwrap();
        let tickers: Vec<&str> = table.rows.iter().map(|h| h.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["RELIANCE", "TCS", "INFY"]);
    }

    #[test]
    fn headers_match_case_insensitively_and_trimmed() {
        let csv = "\
  SYMBOL , sector ,QUANTITY AVAILABLE,  Average Price ,Previous Closing Price
tcs,IT,5,3200,3100
";
        let table = parse_holdings(csv.as_bytes(), "holdings.csv").unwrap();
        assert_eq!(table.len(), 1);
        // Tickers are normalized to uppercase
        assert_eq!(table.rows[0].ticker, "TCS");
    }

    #[test]
    fn parses_tsv_with_tab_delimiter() {
        let tsv = "Symbol\tQuantity Available\tAverage Price\tPrevious Closing Price\n\
                   HDFCBANK\t12\t1600\t1650\n";
        let table = parse_holdings(tsv.as_bytes(), "holdings.tsv").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].ticker, "HDFCBANK");
        assert_eq!(table.rows[0].quantity, 12.0);
    }

    #[test]
    fn extension_matched_case_insensitively() {
        let table = parse_holdings(GOOD_CSV.as_bytes(), "HOLDINGS.CSV").unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn sector_column_is_optional() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   WIPRO,4,400,410\n";
        let table = parse_holdings(csv.as_bytes(), "holdings.csv").unwrap();
        assert_eq!(table.rows[0].sector, None);
        assert_eq!(table.rows[0].sector_label(), "Unknown");
    }

    #[test]
    fn blank_sector_cell_becomes_none() {
        let csv = "Symbol,Sector,Quantity Available,Average Price,Previous Closing Price\n\
                   WIPRO,  ,4,400,410\n";
        let table = parse_holdings(csv.as_bytes(), "holdings.csv").unwrap();
        assert_eq!(table.rows[0].sector, None);
    }

    #[test]
    fn accepts_thousands_separators_in_numbers() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   MRF,2,\"1,23,456.50\",\"1,25,000\"\n";
        let table = parse_holdings(csv.as_bytes(), "holdings.csv").unwrap();
        assert_eq!(table.rows[0].average_price, 123_456.50);
        assert_eq!(table.rows[0].previous_close, 125_000.0);
    }

    #[test]
    fn duplicate_tickers_stay_as_separate_rows() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   TCS,5,3000,3100\n\
                   TCS,3,3300,3100\n";
        let table = parse_holdings(csv.as_bytes(), "holdings.csv").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].quantity, 5.0);
        assert_eq!(table.rows[1].quantity, 3.0);
    }

    #[test]
    fn zero_quantity_row_is_kept() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   SOLDOUT,0,100,90\n";
        let table = parse_holdings(csv.as_bytes(), "holdings.csv").unwrap();
        assert_eq!(table.rows[0].quantity, 0.0);
        assert_eq!(table.rows[0].investment(), 0.0);
    }
}

// ── Format and size gates ───────────────────────────────────────────

mod format_gate {
    use super::*;

    #[test]
    fn rejects_unsupported_extension() {
        let msg = expect_validation(parse_holdings(GOOD_CSV.as_bytes(), "holdings.xlsx"));
        assert!(msg.contains("holdings.xlsx"));
        assert!(msg.contains(".csv and .tsv"));
    }

    #[test]
    fn rejects_filename_without_extension() {
        let result = parse_holdings(GOOD_CSV.as_bytes(), "holdings");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_oversized_upload() {
        let padding = "X,1,1,1\n".repeat(MAX_UPLOAD_BYTES / 8 + 1);
        let big = format!(
            "Symbol,Quantity Available,Average Price,Previous Closing Price\n{padding}"
        );
        let msg = expect_validation(parse_holdings(big.as_bytes(), "big.csv"));
        assert!(msg.contains("upload limit"));
    }

    #[test]
    fn rejects_empty_table() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n";
        let msg = expect_validation(parse_holdings(csv.as_bytes(), "empty.csv"));
        assert!(msg.contains("No holdings rows"));
    }
}

// ── Missing columns ─────────────────────────────────────────────────

mod missing_columns {
    use super::*;

    #[test]
    fn reports_every_missing_column_in_order() {
        let csv = "Symbol,Sector\nTCS,IT\n";
        let result = parse_holdings(csv.as_bytes(), "holdings.csv");
        match result.unwrap_err() {
            CoreError::MissingColumns(cols) => {
                assert_eq!(
                    cols,
                    vec![
                        "quantity available".to_string(),
                        "average price".to_string(),
                        "previous closing price".to_string(),
                    ]
                );
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn reports_single_missing_column() {
        let csv = "Symbol,Quantity Available,Average Price\nTCS,5,3000\n";
        let result = parse_holdings(csv.as_bytes(), "holdings.csv");
        match result.unwrap_err() {
            CoreError::MissingColumns(cols) => {
                assert_eq!(cols, vec!["previous closing price".to_string()]);
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn all_columns_missing_lists_all_required() {
        let csv = "a,b,c\n1,2,3\n";
        let result = parse_holdings(csv.as_bytes(), "holdings.csv");
        match result.unwrap_err() {
            CoreError::MissingColumns(cols) => {
                assert_eq!(cols.len(), REQUIRED_COLUMNS.len());
            }
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }
}

// ── Row validation ──────────────────────────────────────────────────

mod row_validation {
    use super::*;

    #[test]
    fn empty_symbol_names_the_row() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   TCS,5,3000,3100\n\
                   ,2,100,90\n";
        let msg = expect_validation(parse_holdings(csv.as_bytes(), "holdings.csv"));
        // Header is row 1, so the offending data row is row 3
        assert!(msg.contains("Row 3"));
        assert!(msg.contains("symbol"));
    }

    #[test]
    fn negative_quantity_rejected() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   TCS,-5,3000,3100\n";
        let msg = expect_validation(parse_holdings(csv.as_bytes(), "holdings.csv"));
        assert!(msg.contains("Row 2"));
        assert!(msg.contains("quantity available"));
        assert!(msg.contains("non-negative"));
    }

    #[test]
    fn zero_average_price_rejected() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   TCS,5,0,3100\n";
        let msg = expect_validation(parse_holdings(csv.as_bytes(), "holdings.csv"));
        assert!(msg.contains("average price"));
        assert!(msg.contains("positive"));
    }

    #[test]
    fn negative_previous_close_rejected() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   TCS,5,3000,-1\n";
        let msg = expect_validation(parse_holdings(csv.as_bytes(), "holdings.csv"));
        assert!(msg.contains("previous closing price"));
    }

    #[test]
    fn non_numeric_cell_names_column_and_value() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   TCS,many,3000,3100\n";
        let msg = expect_validation(parse_holdings(csv.as_bytes(), "holdings.csv"));
        assert!(msg.contains("'many'"));
        assert!(msg.contains("quantity available"));
    }

    #[test]
    fn non_finite_number_rejected() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   TCS,inf,3000,3100\n";
        let msg = expect_validation(parse_holdings(csv.as_bytes(), "holdings.csv"));
        assert!(msg.contains("Row 2"));
    }

    #[test]
    fn first_invalid_row_wins() {
        let csv = "Symbol,Quantity Available,Average Price,Previous Closing Price\n\
                   TCS,-1,3000,3100\n\
                   INFY,bad,1500,1450\n";
        let msg = expect_validation(parse_holdings(csv.as_bytes(), "holdings.csv"));
        assert!(msg.contains("Row 2"));
    }
}
