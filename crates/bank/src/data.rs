use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use tellerkit_web::{
    procedure, Export, Exports, FileContents, Filesystem, LiveValue, ModuleError, ModuleScope,
    ProcedureSlot,
};
use tracing::{debug, info};

use crate::error::BankError;

/// Encoding token used for every data file read and write.
pub const ENCODING: &str = "utf8";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u32,
    pub date: String,
    pub description: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub unique_name: String,
    pub nickname: String,
    pub balance: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<i64>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accounts {
    pub savings: Account,
    pub checking: Account,
    pub credit: Account,
}

impl Accounts {
    pub fn get(&self, name: &str) -> Result<&Account, BankError> {
        match name {
            "savings" => Ok(&self.savings),
            "checking" => Ok(&self.checking),
            "credit" => Ok(&self.credit),
            other => Err(BankError::UnknownAccount(other.to_string())),
        }
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Account, BankError> {
        match name {
            "savings" => Ok(&mut self.savings),
            "checking" => Ok(&mut self.checking),
            "credit" => Ok(&mut self.credit),
            other => Err(BankError::UnknownAccount(other.to_string())),
        }
    }

    /// Move `amount` between two accounts by unique name.
    ///
    /// Both balances are computed before either is written, so a rejected
    /// transfer leaves the accounts untouched.
    pub fn transfer(&mut self, from: &str, to: &str, amount: i64) -> Result<(), BankError> {
        let overflow = || BankError::InvalidAmount(amount.to_string());
        let debited = self.get(from)?.balance.checked_sub(amount).ok_or_else(overflow)?;
        let credited = self.get(to)?.balance.checked_add(amount).ok_or_else(overflow)?;
        if from == to {
            return Ok(());
        }
        self.get_mut(from)?.balance = debited;
        self.get_mut(to)?.balance = credited;
        Ok(())
    }

    /// Pay down the credit card: the balance owed drops, available credit grows.
    pub fn pay_credit(&mut self, amount: i64) -> Result<(), BankError> {
        let overflow = || BankError::InvalidAmount(amount.to_string());
        let credit = &mut self.credit;
        let balance = credit.balance.checked_sub(amount).ok_or_else(overflow)?;
        let available = credit
            .available
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(overflow)?;
        credit.balance = balance;
        credit.available = Some(available);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub username: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

/// Parse a form amount the way the browser form delivers it.
///
/// Numbers are truncated toward zero. Text keeps its leading integer (`"25"`,
/// `" 25.9"`, `"25 dollars"` are all 25); text without one is rejected.
pub fn parse_amount(value: &Value) -> Result<i64, BankError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(|| BankError::InvalidAmount(n.to_string())),
        Value::String(s) => leading_integer(s).ok_or_else(|| BankError::InvalidAmount(s.clone())),
        other => Err(BankError::InvalidAmount(other.to_string())),
    }
}

fn leading_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.as_bytes().first()? {
        b'-' => (-1, &trimmed[1..]),
        b'+' => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Account state shared by every module of one load.
#[derive(Debug, Clone)]
pub struct SharedAccounts(Arc<Mutex<Accounts>>);

impl SharedAccounts {
    pub fn new(accounts: Accounts) -> Self {
        SharedAccounts(Arc::new(Mutex::new(accounts)))
    }

    pub fn read<T>(&self, f: impl FnOnce(&Accounts) -> T) -> T {
        let guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    pub fn update<T>(&self, f: impl FnOnce(&mut Accounts) -> T) -> T {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }

    pub fn account_value(&self, name: &str) -> Result<Value, BankError> {
        self.read(|accounts| Ok(serde_json::to_value(accounts.get(name)?)?))
    }

    pub fn to_value(&self) -> Result<Value, BankError> {
        self.read(|accounts| Ok(serde_json::to_value(accounts)?))
    }

    /// Serialize the way the data file is laid out: four-space indentation.
    pub fn to_pretty_json(&self) -> Result<String, BankError> {
        self.read(|accounts| {
            let mut out = Vec::new();
            let mut ser =
                serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
            accounts.serialize(&mut ser)?;
            Ok(String::from_utf8_lossy(&out).into_owned())
        })
    }
}

impl LiveValue for SharedAccounts {
    fn snapshot(&self) -> Value {
        self.to_value().unwrap_or(Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Everything the data module loads and exposes.
pub struct DataStore {
    pub account_data: FileContents,
    pub user_data: FileContents,
    pub accounts: SharedAccounts,
    pub users: Vec<User>,
    pub write_json: ProcedureSlot,
}

fn read_text(fs: &dyn Filesystem, path: &Path) -> Result<(FileContents, String), BankError> {
    let contents = fs.read(path, Some(ENCODING))?;
    let text = contents.as_text().map(str::to_string).ok_or_else(|| BankError::Data {
        path: path.display().to_string(),
        reason: "expected text".into(),
    })?;
    Ok((contents, text))
}

impl DataStore {
    pub fn load(fs: Arc<dyn Filesystem>, accounts_path: PathBuf, users_path: &Path) -> Result<Self, BankError> {
        let (account_data, accounts_text) = read_text(fs.as_ref(), &accounts_path)?;
        let (user_data, users_text) = read_text(fs.as_ref(), users_path)?;
        let accounts = SharedAccounts::new(serde_json::from_str(&accounts_text)?);
        let users: Vec<User> = serde_json::from_str(&users_text)?;
        debug!(users = users.len(), "data loaded");

        let state = accounts.clone();
        let write_json = procedure(move || {
            let json = state.to_pretty_json()?;
            fs.write(&accounts_path, &json, ENCODING)?;
            info!(path = %accounts_path.display(), "accounts written");
            Ok(())
        });

        Ok(DataStore {
            account_data,
            user_data,
            accounts,
            users,
            write_json,
        })
    }

    pub fn exports(&self, module: &str) -> Result<Exports, BankError> {
        Ok(Exports::new(module)
            .with("accountData", Export::from(self.account_data.clone()))
            .with("userData", Export::from(self.user_data.clone()))
            .with("accounts", Export::Live(Arc::new(self.accounts.clone())))
            .with("users", Export::Json(serde_json::to_value(&self.users)?))
            .with("writeJSON", Export::Procedure(self.write_json.clone())))
    }
}

pub fn entry(scope: &ModuleScope<'_>) -> Result<Exports, ModuleError> {
    let layout = scope.layout();
    let store = DataStore::load(
        Arc::clone(scope.fs()),
        layout.data_file("accounts"),
        &layout.data_file("users"),
    )
    .map_err(|e| scope.fail(e))?;
    store.exports(scope.name()).map_err(|e| scope.fail(e))
}

/// The live account state behind a module's `accounts` export.
pub fn shared_accounts(exports: &Exports) -> Result<SharedAccounts, ModuleError> {
    match exports.require("accounts")? {
        Export::Live(live) => live
            .as_any()
            .downcast_ref::<SharedAccounts>()
            .cloned()
            .ok_or_else(|| ModuleError::ExportKind {
                module: exports.module().to_string(),
                name: "accounts".into(),
                found: "a foreign value",
                expected: "account state",
            }),
        other => Err(ModuleError::ExportKind {
            module: exports.module().to_string(),
            name: "accounts".into(),
            found: other.kind(),
            expected: "account state",
        }),
    }
}

pub fn users(exports: &Exports) -> Result<Vec<User>, BankError> {
    Ok(serde_json::from_value(exports.value("users")?)?)
}
