//! A4 statement for one dues settlement.

use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerReference, Point,
};
use rust_decimal::Decimal;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{Customer, Payment, PaymentDue},
    services::amount_words::amount_in_words,
};

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const LEFT: f32 = 15.0;
const RIGHT: f32 = 195.0;
const BOTTOM: f32 = 30.0;

const COL_DATE: f32 = LEFT;
const COL_REFERENCE: f32 = 55.0;
const COL_BALANCE: f32 = 160.0;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

/// Tracks the current layer and pen position, starting a new page when the
/// next row would run into the footer margin.
struct Cursor<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
    pages: usize,
}

impl Cursor<'_> {
    fn text(&self, font: &IndirectFontRef, text: &str, size: f32, x: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn rule(&self) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(Mm(LEFT), Mm(self.y)), false),
                (Point::new(Mm(RIGHT), Mm(self.y)), false),
            ],
            is_closed: false,
        });
    }

    fn advance(&mut self, by: f32) {
        self.y -= by;
        if self.y < BOTTOM {
            self.pages += 1;
            let (page, layer) = self.doc.add_page(
                Mm(PAGE_WIDTH),
                Mm(PAGE_HEIGHT),
                format!("Page {}", self.pages),
            );
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT - 20.0;
        }
    }
}

pub fn render_statement(
    config: &AppConfig,
    customer: &Customer,
    payment: &Payment,
    dues: &[PaymentDue],
) -> AppResult<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(
        format!("Statement for {}", customer.name),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "Page 1",
    );
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(pdf_error)?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_error)?,
    };

    let mut cursor = Cursor {
        layer: doc.get_page(page).get_layer(layer),
        doc: &doc,
        y: 280.0,
        pages: 1,
    };

    write_header(&mut cursor, &fonts, config, customer, payment);
    write_dues(&mut cursor, &fonts, dues);
    write_totals(&mut cursor, &fonts, payment);

    let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer).map_err(pdf_error)?;
    writer
        .into_inner()
        .map_err(|error| AppError::Internal(format!("Could not flush statement PDF: {error}")))
}

fn write_header(
    cursor: &mut Cursor<'_>,
    fonts: &Fonts,
    config: &AppConfig,
    customer: &Customer,
    payment: &Payment,
) {
    cursor.text(&fonts.bold, &config.shop_name, 16.0, LEFT);
    cursor.text(&fonts.bold, "PAYMENT STATEMENT", 14.0, 130.0);
    cursor.advance(7.0);
    if !config.shop_address.is_empty() {
        cursor.text(&fonts.regular, &config.shop_address, 10.0, LEFT);
    }
    cursor.text(&fonts.regular, &format!("Receipt #{}", payment.id), 10.0, 130.0);
    cursor.advance(5.0);
    if !config.shop_phone.is_empty() {
        cursor.text(&fonts.regular, &format!("Phone: {}", config.shop_phone), 10.0, LEFT);
    }
    cursor.text(
        &fonts.regular,
        &format!("Date: {}", payment.created_at.format("%d-%m-%Y")),
        10.0,
        130.0,
    );
    cursor.advance(8.0);
    cursor.rule();
    cursor.advance(8.0);

    cursor.text(&fonts.bold, "Billed to", 11.0, LEFT);
    cursor.advance(6.0);
    cursor.text(&fonts.regular, &customer.name, 10.0, LEFT);
    for line in [&customer.address, &customer.phone, &customer.email]
        .into_iter()
        .flatten()
        .filter(|value| !value.trim().is_empty())
    {
        cursor.advance(5.0);
        cursor.text(&fonts.regular, line, 10.0, LEFT);
    }
    cursor.advance(6.0);
    cursor.text(
        &fonts.regular,
        &format!("Payment mode: {}", payment.payment_mode),
        10.0,
        LEFT,
    );
    cursor.advance(10.0);
}

fn write_dues(cursor: &mut Cursor<'_>, fonts: &Fonts, dues: &[PaymentDue]) {
    cursor.text(&fonts.bold, "Date", 10.0, COL_DATE);
    cursor.text(&fonts.bold, "Reference", 10.0, COL_REFERENCE);
    cursor.text(&fonts.bold, "Balance", 10.0, COL_BALANCE);
    cursor.advance(3.0);
    cursor.rule();
    cursor.advance(6.0);

    for due in dues {
        cursor.text(
            &fonts.regular,
            &due.created_at.format("%d-%m-%Y").to_string(),
            10.0,
            COL_DATE,
        );
        cursor.text(&fonts.regular, &due_reference(due), 10.0, COL_REFERENCE);
        cursor.text(&fonts.regular, &format_money(due.balance_due), 10.0, COL_BALANCE);
        cursor.advance(6.0);
    }
    cursor.rule();
    cursor.advance(8.0);
}

fn write_totals(cursor: &mut Cursor<'_>, fonts: &Fonts, payment: &Payment) {
    cursor.text(&fonts.bold, "Total paid", 11.0, COL_REFERENCE);
    cursor.text(&fonts.bold, &format_money(payment.paid_amount), 11.0, COL_BALANCE);
    cursor.advance(8.0);
    cursor.text(&fonts.regular, "Amount in words:", 10.0, LEFT);
    cursor.advance(5.0);
    cursor.text(&fonts.bold, &amount_in_words(payment.paid_amount), 10.0, LEFT);
    cursor.advance(12.0);
    cursor.text(
        &fonts.regular,
        "This is a computer generated statement.",
        8.0,
        LEFT,
    );
}

fn due_reference(due: &PaymentDue) -> String {
    match (due.invoice_id, due.ticket_id) {
        (Some(invoice_id), _) => format!("Invoice #{invoice_id}"),
        (None, Some(ticket_id)) => format!("Ticket #{ticket_id}"),
        (None, None) => format!("Due #{}", due.id),
    }
}

/// Built-in PDF fonts lack the rupee sign, so amounts use "Rs.".
fn format_money(amount: Decimal) -> String {
    format!("Rs. {:.2}", amount.round_dp(2))
}

fn pdf_error(error: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("Could not render statement PDF: {error}"))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    use crate::{
        config::AppConfig,
        models::{Customer, Payment, PaymentDue, SETTLEMENT_DESCRIPTION},
    };

    use super::{due_reference, format_money, render_statement};

    fn money(raw: &str) -> Decimal {
        Decimal::from_str(raw).expect("decimal")
    }

    fn customer() -> Customer {
        Customer {
            id: 4,
            name: "Asha Traders".to_string(),
            phone: Some("98450 00000".to_string()),
            email: None,
            address: Some("12 MG Road".to_string()),
            branch_id: Some(1),
        }
    }

    fn payment(total: Decimal) -> Payment {
        let at = Utc.with_ymd_and_hms(2026, 4, 2, 9, 30, 0).unwrap();
        Payment {
            id: 77,
            invoice_id: None,
            ticket_id: None,
            customer_id: 4,
            branch_id: Some(1),
            service_charge: Decimal::ZERO,
            item_amount: total,
            total_amount: total,
            discount: Decimal::ZERO,
            net_amount: total,
            paid_amount: total,
            balance_due: Decimal::ZERO,
            payment_mode: "UPI".to_string(),
            description: Some(SETTLEMENT_DESCRIPTION.to_string()),
            created_by: 5,
            created_at: at,
            updated_at: at,
        }
    }

    fn due(id: i64, invoice_id: Option<i64>, ticket_id: Option<i64>) -> PaymentDue {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        PaymentDue {
            id,
            invoice_id,
            ticket_id,
            customer_id: 4,
            branch_id: Some(1),
            balance_due: money("125.50"),
            status: "paid".to_string(),
            payment_id: Some(77),
            created_by: 5,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn renders_a_pdf_document() {
        let dues = vec![due(1, Some(10), None), due(2, None, Some(20))];
        let bytes = render_statement(
            &AppConfig::for_tests(),
            &customer(),
            &payment(money("251.00")),
            &dues,
        )
        .expect("pdf");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_statements_spill_onto_more_pages() {
        let dues = (1..=120).map(|id| due(id, Some(id), None)).collect::<Vec<_>>();
        let bytes = render_statement(
            &AppConfig::for_tests(),
            &customer(),
            &payment(money("15060.00")),
            &dues,
        )
        .expect("pdf");
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn references_prefer_invoice_then_ticket() {
        assert_eq!(due_reference(&due(1, Some(10), Some(20))), "Invoice #10");
        assert_eq!(due_reference(&due(1, None, Some(20))), "Ticket #20");
        assert_eq!(due_reference(&due(3, None, None)), "Due #3");
    }

    #[test]
    fn money_always_shows_two_places() {
        assert_eq!(format_money(money("75.5")), "Rs. 75.50");
        assert_eq!(format_money(money("0")), "Rs. 0.00");
    }
}
