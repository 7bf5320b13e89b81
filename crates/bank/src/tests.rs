#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use serde_json::json;
    use tellerkit_web::{Dependencies, Filesystem, MemoryFs, ModuleError, ProjectLayout, Session};

    use crate::data::{parse_amount, shared_accounts, Accounts, SharedAccounts};
    use crate::error::BankError;

    const ACCOUNTS: &str = include_str!("json/accounts.json");
    const USERS: &str = include_str!("json/users.json");

    fn accounts() -> Accounts {
        serde_json::from_str(ACCOUNTS).unwrap()
    }

    fn memory_project() -> (Arc<MemoryFs>, Session) {
        let fs = Arc::new(
            MemoryFs::new()
                .with_file("/bank/src/json/accounts.json", ACCOUNTS)
                .with_file("/bank/src/json/users.json", USERS),
        );
        let deps = Dependencies::new(fs.clone(), ProjectLayout::at("/bank"));
        (fs, Session::new(crate::modules(), deps))
    }

    #[test]
    fn test_parse_amount_numbers_and_text() {
        assert_eq!(parse_amount(&json!(325)).unwrap(), 325);
        assert_eq!(parse_amount(&json!(12.9)).unwrap(), 12);
        assert_eq!(parse_amount(&json!("100")).unwrap(), 100);
        assert_eq!(parse_amount(&json!("  42.5")).unwrap(), 42);
        assert_eq!(parse_amount(&json!("-7 dollars")).unwrap(), -7);
        assert!(matches!(parse_amount(&json!("abc")), Err(BankError::InvalidAmount(_))));
        assert!(matches!(parse_amount(&json!(null)), Err(BankError::InvalidAmount(_))));
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut all = accounts();
        let (savings, checking) = (all.savings.balance, all.checking.balance);
        all.transfer("savings", "checking", 100).unwrap();
        assert_eq!(all.savings.balance, savings - 100);
        assert_eq!(all.checking.balance, checking + 100);
    }

    #[test]
    fn test_transfer_unknown_account_changes_nothing() {
        let mut all = accounts();
        let before = all.clone();
        assert!(matches!(
            all.transfer("savings", "brokerage", 5),
            Err(BankError::UnknownAccount(_))
        ));
        assert_eq!(all, before);
    }

    #[test]
    fn test_pay_credit() {
        let mut all = accounts();
        let (balance, available) = (all.credit.balance, all.credit.available.unwrap());
        all.pay_credit(325).unwrap();
        assert_eq!(all.credit.balance, balance - 325);
        assert_eq!(all.credit.available, Some(available + 325));
    }

    #[test]
    fn test_overflowing_amounts_change_nothing() {
        let mut all = accounts();
        let before = all.clone();
        assert!(matches!(
            all.transfer("savings", "checking", i64::MAX),
            Err(BankError::InvalidAmount(_))
        ));
        assert!(matches!(
            all.transfer("savings", "checking", i64::MIN),
            Err(BankError::InvalidAmount(_))
        ));
        assert!(matches!(all.pay_credit(i64::MAX), Err(BankError::InvalidAmount(_))));
        assert_eq!(all, before);
    }

    #[test]
    fn test_pretty_json_round_trips() {
        let shared = SharedAccounts::new(accounts());
        let text = shared.to_pretty_json().unwrap();
        assert!(text.starts_with("{\n    \"savings\""));
        let back: Accounts = serde_json::from_str(&text).unwrap();
        assert_eq!(back, accounts());
    }

    #[test]
    fn test_data_module_exports() {
        let (_fs, session) = memory_project();
        let data = session.require("data").unwrap();
        for name in ["accountData", "userData", "accounts", "users", "writeJSON"] {
            assert!(data.contains(name), "missing {name}");
        }
        assert_eq!(data.value("users").unwrap()[0]["name"], "PS User");
        assert!(data.value("accountData").unwrap().is_string());
    }

    #[test]
    fn test_write_json_persists_current_state() {
        let (fs, session) = memory_project();
        let data = session.require("data").unwrap();
        let shared = shared_accounts(&data).unwrap();
        shared.update(|all| all.transfer("savings", "checking", 1)).unwrap();
        data.procedure("writeJSON").unwrap().get().call().unwrap();
        let written = fs.contents(Path::new("/bank/src/json/accounts.json")).unwrap();
        let saved: Accounts = serde_json::from_str(&written).unwrap();
        assert_eq!(saved.savings.balance, accounts().savings.balance - 1);
    }

    #[test]
    fn test_modules_share_account_state() {
        let (_fs, session) = memory_project();
        let app = session.require("app").unwrap();
        let routes = session.require("routes/services").unwrap();
        let from_app = shared_accounts(&app).unwrap();
        let from_routes = shared_accounts(&routes).unwrap();
        from_routes.update(|all| all.pay_credit(10)).unwrap();
        assert_eq!(from_app.read(|all| all.credit.balance), accounts().credit.balance - 10);
        assert!(app.router("accountRoutes").unwrap().ptr_eq(
            &session.require("routes/accounts").unwrap().router("router").unwrap()
        ));
    }

    #[test]
    fn test_missing_data_file_fails_load() {
        let fs: Arc<dyn Filesystem> = Arc::new(MemoryFs::new());
        let session = Session::new(crate::modules(), Dependencies::new(fs, ProjectLayout::at("/none")));
        assert!(matches!(session.require("app"), Err(ModuleError::Entry { .. })));
    }
}
