use std::sync::Arc;

use serde_json::json;
use tellerkit_web::{
    handler, Export, Exports, Handler, ModuleError, ModuleScope, ProcedureSlot, Request,
};
use tracing::info;

use crate::data::{parse_amount, shared_accounts, SharedAccounts};
use crate::error::BankError;

fn field(req: &Request, name: &'static str) -> Result<String, BankError> {
    req.body_text(name).ok_or(BankError::MissingField(name))
}

fn amount(req: &Request) -> Result<i64, BankError> {
    let value = req.body_value("amount").ok_or(BankError::MissingField("amount"))?;
    parse_amount(value)
}

fn transfer_form() -> Arc<dyn Handler> {
    handler(|_req, res| res.render("transfer", json!({})))
}

fn transfer(accounts: SharedAccounts, write_json: ProcedureSlot) -> Arc<dyn Handler> {
    handler(move |req, res| {
        let from = field(req, "from")?;
        let to = field(req, "to")?;
        let amount = amount(req)?;
        accounts.update(|all| all.transfer(&from, &to, amount))?;
        write_json.get().call()?;
        info!(%from, %to, amount, "transfer completed");
        res.render("transfer", json!({ "message": "Transfer Completed" }))
    })
}

fn payment_form(accounts: SharedAccounts) -> Arc<dyn Handler> {
    handler(move |_req, res| {
        let account = accounts.account_value("credit")?;
        res.render("payment", json!({ "account": account }))
    })
}

fn payment(accounts: SharedAccounts, write_json: ProcedureSlot) -> Arc<dyn Handler> {
    handler(move |req, res| {
        let amount = amount(req)?;
        accounts.update(|all| all.pay_credit(amount))?;
        write_json.get().call()?;
        info!(amount, "payment applied");
        let account = accounts.account_value("credit")?;
        res.render(
            "payment",
            json!({ "message": "Payment Successful", "account": account }),
        )
    })
}

pub fn entry(scope: &ModuleScope<'_>) -> Result<Exports, ModuleError> {
    let data = scope.require("data")?;
    let accounts = shared_accounts(&data)?;
    let write_json = data.procedure("writeJSON")?;

    let router = scope.framework().router();
    router.get("/transfer", transfer_form());
    router.post("/transfer", transfer(accounts.clone(), write_json.clone()));
    router.get("/payment", payment_form(accounts.clone()));
    router.post("/payment", payment(accounts.clone(), write_json.clone()));

    Ok(Exports::new(scope.name())
        .with("router", Export::Router(router))
        .with("accounts", Export::Live(Arc::new(accounts)))
        .with("writeJSON", Export::Procedure(write_json)))
}
