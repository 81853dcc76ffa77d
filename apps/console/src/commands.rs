//! Operator input parsed into console commands.

use anyhow::{anyhow, bail, Context, Result};
use shared::{
    domain::{CustomerId, OrderStatus},
    protocol::{CustomerDraft, CustomerPatch, LoginRequest, NewOrder, OrderPatch, RegisterRequest},
};

use crate::routes::Route;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Login(LoginRequest),
    Register(RegisterRequest),
    Logout,
    Go(Route),
    Back,
    Next,
    Prev,
    Refresh,
    New,
    Edit(String),
    Save(Fields),
    Cancel,
    SetStatus { id: String, status: OrderStatus },
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  login <username> <password>
  register <first_name> <username> <password> [last_name]
  logout
  go <dashboard|customers|orders|signup|signin>
  back
  next | prev | refresh
  new                      open the create form on the current list
  edit <id>                open the edit form for a record
  save key=value; ...      submit the open form
  cancel                   close the open form
  status <order_id> <ordered|shipped|delivered|fitted>
  help | quit";

pub fn parse_command(line: &str) -> Result<ConsoleCommand> {
    let line = line.trim();
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map(|(verb, rest)| (verb, rest.trim()))
        .unwrap_or((line, ""));
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match (verb.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("login", [username, password]) => ConsoleCommand::Login(LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }),
        ("register", [first_name, username, password, last_name @ ..]) if last_name.len() <= 1 => {
            ConsoleCommand::Register(RegisterRequest {
                first_name: first_name.to_string(),
                last_name: last_name.first().map(|name| name.to_string()),
                username: username.to_string(),
                password: password.to_string(),
            })
        }
        ("logout", []) => ConsoleCommand::Logout,
        ("go", [target]) => ConsoleCommand::Go(
            Route::parse(target).ok_or_else(|| anyhow!("unknown screen '{target}'"))?,
        ),
        ("back", []) => ConsoleCommand::Back,
        ("next", []) => ConsoleCommand::Next,
        ("prev", []) => ConsoleCommand::Prev,
        ("refresh", []) => ConsoleCommand::Refresh,
        ("new", []) => ConsoleCommand::New,
        ("edit", [id]) => ConsoleCommand::Edit(id.to_string()),
        ("save", _) => ConsoleCommand::Save(Fields::parse(rest)?),
        ("cancel", []) => ConsoleCommand::Cancel,
        ("status", [id, status]) => ConsoleCommand::SetStatus {
            id: id.to_string(),
            status: OrderStatus::parse(status)
                .ok_or_else(|| anyhow!("unknown order status '{status}'"))?,
        },
        ("help", []) => ConsoleCommand::Help,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        _ => bail!("unrecognized command '{line}'; type `help`"),
    };
    Ok(command)
}

/// `key=value` pairs separated by `;`, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, String)>);

impl Fields {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for part in raw.split(';').map(str::trim).filter(|part| !part.is_empty()) {
            let (key, value) = part
                .split_once('=')
                .with_context(|| format!("expected key=value, got '{part}'"))?;
            let key = key.trim();
            if key.is_empty() {
                bail!("empty field name in '{part}'");
            }
            pairs.push((key.to_ascii_lowercase(), value.trim().to_string()));
        }
        Ok(Self(pairs))
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_owned)
    }

    fn optional_text(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.is_empty()).map(str::to_owned)
    }

    fn amount(&self, key: &str) -> Result<Option<f64>> {
        self.get(key)
            .map(|raw| {
                raw.parse::<f64>()
                    .with_context(|| format!("{key} must be a number, got '{raw}'"))
            })
            .transpose()
    }

    fn ensure_known(&self, known: &[&str]) -> Result<()> {
        if let Some((key, _)) = self.0.iter().find(|(k, _)| !known.contains(&k.as_str())) {
            bail!("unknown field '{key}'; expected one of: {}", known.join(", "));
        }
        Ok(())
    }
}

const CUSTOMER_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "phone",
    "address",
    "hearing_loss_level",
    "budget_range",
];

const ORDER_FIELDS: &[&str] = &[
    "customer_id",
    "total_amount",
    "insurance_discount",
    "delivery_date",
    "tracking_number",
    "notes",
];

pub fn customer_draft(fields: &Fields) -> Result<CustomerDraft> {
    fields.ensure_known(CUSTOMER_FIELDS)?;
    Ok(CustomerDraft {
        first_name: fields.text("first_name").unwrap_or_default(),
        last_name: fields.optional_text("last_name"),
        email: fields.text("email").unwrap_or_default(),
        phone: fields.text("phone").unwrap_or_default(),
        address: fields.text("address").unwrap_or_default(),
        hearing_loss_level: fields.optional_text("hearing_loss_level"),
        budget_range: fields.optional_text("budget_range"),
    })
}

pub fn customer_patch(fields: &Fields) -> Result<CustomerPatch> {
    fields.ensure_known(CUSTOMER_FIELDS)?;
    let patch = CustomerPatch {
        first_name: fields.text("first_name"),
        last_name: fields.text("last_name"),
        email: fields.text("email"),
        phone: fields.text("phone"),
        address: fields.text("address"),
        hearing_loss_level: fields.text("hearing_loss_level"),
        budget_range: fields.text("budget_range"),
    };
    if patch.is_empty() {
        bail!("nothing to update; give at least one field");
    }
    Ok(patch)
}

pub fn new_order(fields: &Fields) -> Result<NewOrder> {
    fields.ensure_known(ORDER_FIELDS)?;
    let customer_id = fields
        .optional_text("customer_id")
        .context("customer_id is required")?;
    Ok(NewOrder {
        customer_id: CustomerId::new(customer_id),
        total_amount: fields.amount("total_amount")?.unwrap_or_default(),
        insurance_discount: fields.amount("insurance_discount")?.unwrap_or_default(),
        delivery_date: fields.optional_text("delivery_date"),
        tracking_number: fields.optional_text("tracking_number"),
        notes: fields.text("notes").unwrap_or_default(),
    })
}

pub fn order_patch(fields: &Fields) -> Result<OrderPatch> {
    if fields.get("status").is_some() {
        bail!("status changes go through `status <order_id> <status>`");
    }
    fields.ensure_known(&ORDER_FIELDS[1..])?;
    let patch = OrderPatch {
        total_amount: fields.amount("total_amount")?,
        insurance_discount: fields.amount("insurance_discount")?,
        delivery_date: fields.text("delivery_date"),
        tracking_number: fields.text("tracking_number"),
        notes: fields.text("notes"),
    };
    if patch == OrderPatch::default() {
        bail!("nothing to update; give at least one field");
    }
    Ok(patch)
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
