use crate::cli::args::{CliArgs, Command};
use crate::resources::Cadre;

pub fn parse_column_filter(raw: &str) -> Result<(String, String), String> {
    let (column, needle) = raw
        .split_once('=')
        .ok_or_else(|| format!("invalid --filter '{raw}': expected COLUMN=TEXT"))?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("invalid --filter '{raw}': column is empty"));
    }
    Ok((column.to_string(), needle.trim().to_string()))
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    for raw in args.filter.iter() {
        parse_column_filter(raw)?;
    }
    if let Some(size) = args.page_size {
        if size == 0 {
            return Err("invalid --page-size, expected positive integer".to_string());
        }
    }
    if let Some(page) = args.page {
        if page == 0 {
            return Err("invalid --page, pages are 1-based".to_string());
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected text or json"
            ));
        }
    }
    if let Command::Members { cadre: Some(raw) } = &args.command {
        if Cadre::parse(raw).is_none() {
            return Err(format!(
                "invalid --cadre '{raw}', expected APM, PM, DO or MD"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_filter_parses_key_and_text() {
        assert_eq!(
            parse_column_filter("plot_no = A1").unwrap(),
            ("plot_no".to_string(), "A1".to_string())
        );
        assert!(parse_column_filter("plot_no").is_err());
        assert!(parse_column_filter("=x").is_err());
    }
}
