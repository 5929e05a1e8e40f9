//! Test page: confirms the link and the command set end to end.

use chrono::NaiveDateTime;
use printer_link::protocol::{
    Alignment, CodeTable, encode_alignment, encode_code_table, encode_feed_and_cut,
    encode_initialize, encode_text, encode_text_style, encode_underline,
};
use printer_link::{Command, CommandBuffer, PrinterLinkError, TextStyle};

use crate::app::SharedState;

/// Lines fed before the cut so the last text clears the cutter.
const TRAILING_FEED: u16 = 3;

pub fn build_test_page(
    model: Option<&str>,
    address: &str,
    printed_at: NaiveDateTime,
) -> printer_link::Result<Command> {
    let heading = TextStyle::new(true, false, true, 2, 2)?;
    let body = TextStyle::default();

    Ok(CommandBuffer::new()
        .push(encode_initialize())
        .push(encode_code_table(CodeTable::Cp437))
        .push(encode_alignment(Alignment::Center as u8))
        .push(encode_text_style(&heading))
        .push(encode_underline(heading.underline()))
        .push(encode_text("TEST PAGE\n"))
        .push(encode_text_style(&body))
        .push(encode_underline(body.underline()))
        .push(encode_alignment(Alignment::Left as u8))
        .push(encode_text(&format!("Model:   {}\n", model.unwrap_or("unknown"))))
        .push(encode_text(&format!("Address: {address}\n")))
        .push(encode_text(&format!(
            "Printed: {}\n",
            printed_at.format("%Y-%m-%d %H:%M:%S")
        )))
        .push(encode_feed_and_cut(TRAILING_FEED))
        .finish())
}

/// Check the printer is ready and print a test page on it.
pub async fn print_test_page(state: &SharedState) -> Result<(), anyhow::Error> {
    let target = state
        .targets()
        .active_printer()
        .await
        .ok_or(PrinterLinkError::ConfigurationAbsent)?;

    let manager = state.manager();
    let status = manager.ensure_ready().await?;
    tracing::debug!(raw = status.raw, "Printer ready: {}", status.description());

    let page = build_test_page(
        target.display_model.as_deref(),
        &target.mac_address,
        chrono::Local::now().naive_local(),
    )?;
    manager.send(&page)?;
    tracing::info!(address = %target.mac_address, bytes = page.len(), "Test page sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{default_state, state_with};
    use crate::config::AppConfig;
    use chrono::NaiveDate;
    use printer_link::PrinterTarget;
    use std::path::Path;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn page_starts_with_reset_and_ends_with_cut() {
        let page = build_test_page(Some("WISP-i350"), "1C:B8:57:50:01:D9", at()).unwrap();
        let bytes = page.as_bytes();

        assert!(bytes.starts_with(&[0x1b, 0x40]));
        assert!(bytes.ends_with(&[0x0a, 0x0a, 0x0a, 0x1d, 0x56, 0x42, 0x00]));
    }

    #[test]
    fn page_carries_heading_style_and_details() {
        let page = build_test_page(None, "1C:B8:57:50:01:D9", at()).unwrap();
        let bytes = page.as_bytes();

        // Bold on, 2x2, underlined heading; plain body.
        assert!(contains(bytes, &[0x1b, 0x45, 0x01, 0x1d, 0x21, 0x11, 0x1b, 0x2d, 0x01]));
        assert!(contains(bytes, &[0x1b, 0x45, 0x00, 0x1d, 0x21, 0x00, 0x1b, 0x2d, 0x00]));
        assert!(contains(bytes, b"Model:   unknown\n"));
        assert!(contains(bytes, b"Address: 1C:B8:57:50:01:D9\n"));
        assert!(contains(bytes, b"Printed: 2024-03-09 14:05:00\n"));
    }

    #[tokio::test]
    async fn printing_without_configured_printer_fails() {
        let err = print_test_page(&default_state()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PrinterLinkError>(),
            Some(PrinterLinkError::ConfigurationAbsent)
        ));
    }

    #[tokio::test]
    async fn printing_while_disconnected_fails() {
        let target = PrinterTarget {
            mac_address: "1C:B8:57:50:01:D9".into(),
            display_model: Some("WISP-i350".into()),
        };
        let state = state_with(AppConfig::with_data_dir(Path::new("/tmp")), Some(target));

        let err = print_test_page(&state).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PrinterLinkError>(),
            Some(PrinterLinkError::NotConnected)
        ));
    }
}
