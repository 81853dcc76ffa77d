//! Plain-text rendering of list screens.

use std::fmt::Write as _;

use client_core::{FormSurface, Resource, ResourceListState};
use shared::domain::{Customer, Order};

pub trait TableRow: Resource {
    const TITLE: &'static str;

    fn headers() -> &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

impl TableRow for Customer {
    const TITLE: &'static str = "Customers";

    fn headers() -> &'static [&'static str] {
        &["id", "name", "email", "phone", "address"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.display_name(),
            self.email.clone(),
            self.phone.clone(),
            self.address.clone(),
        ]
    }
}

impl TableRow for Order {
    const TITLE: &'static str = "Orders";

    fn headers() -> &'static [&'static str] {
        &["id", "customer", "status", "total", "discount", "tracking"]
    }

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.customer_id.to_string(),
            self.status.to_string(),
            format!("{:.2}", self.total_amount),
            format!("{:.2}", self.insurance_discount),
            self.tracking_number.clone().unwrap_or_else(|| "-".into()),
        ]
    }
}

pub fn render_list<R: TableRow>(state: &ResourceListState<R>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", R::TITLE);

    if let Some(error) = &state.error {
        let _ = writeln!(out, "error: {}", error.message);
    }

    let rows: Vec<Vec<String>> = state.items.iter().map(R::cells).collect();
    if rows.is_empty() && !state.loading {
        let _ = writeln!(out, "(no {})", R::COLLECTION);
    } else {
        write_table(&mut out, R::headers(), &rows);
    }

    let _ = write!(out, "page {} of {}", state.page, state.total_pages);
    if state.has_previous() {
        out.push_str("  [prev]");
    }
    if state.has_next() {
        out.push_str("  [next]");
    }
    if state.loading {
        out.push_str("  loading...");
    }
    out.push('\n');

    match &state.form {
        FormSurface::Closed => {}
        FormSurface::Create => {
            let _ = writeln!(out, "form: new {} (save key=value; ... | cancel)", R::SINGULAR);
        }
        FormSurface::Edit(id) => {
            let _ = writeln!(out, "form: edit {} {id} (save key=value; ... | cancel)", R::SINGULAR);
        }
    }
    if let Some(error) = &state.mutation_error {
        let _ = writeln!(out, "save failed: {}", error.message);
    }
    out
}

fn write_table(out: &mut String, headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    write_row(out, headers.iter().copied(), &widths);
    for row in rows {
        write_row(out, row.iter().map(String::as_str), &widths);
    }
}

fn write_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    let _ = writeln!(out, "{}", padded.join(" | ").trim_end());
}
