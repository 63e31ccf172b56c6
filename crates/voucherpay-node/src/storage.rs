//! RocksDB ledger for the Voucherpay node.

use anyhow::Result;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use voucherpay_core::{Account, AccountNumber, PlanId, RatePlan, TransferVoucher, VoucherCode};
use voucherpay_notify::{AuditEntry, AuditSink, NotifyError};
use voucherpay_settlement::{CommitOutcome, LedgerStore, SettleCommit, StoreError};

/// Column family names for different data types.
const CF_ACCOUNTS: &str = "accounts";
const CF_VOUCHERS: &str = "vouchers";
const CF_PLANS: &str = "plans";
const CF_AUDIT: &str = "audit";

/// RocksDB-backed ledger and audit store.
pub struct RocksLedger {
    db: DB,
    /// Serializes conditional commits.
    commit_lock: Mutex<()>,
}

impl RocksLedger {
    /// Open or create a RocksDB database at the given path with column families.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_VOUCHERS, Options::default()),
            ColumnFamilyDescriptor::new(CF_PLANS, Options::default()),
            ColumnFamilyDescriptor::new(CF_AUDIT, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db,
            commit_lock: Mutex::new(()),
        })
    }

    /// Store an account unless one with the same number exists.
    /// Returns whether it was written.
    pub fn insert_account(&self, account: &Account) -> Result<bool, StoreError> {
        self.insert_new(CF_ACCOUNTS, &account_key(account.number), account)
    }

    /// Store a voucher unless one with the same code exists. A settled
    /// voucher is never overwritten.
    pub fn insert_voucher(&self, voucher: &TransferVoucher) -> Result<bool, StoreError> {
        self.insert_new(CF_VOUCHERS, voucher.code.as_str().as_bytes(), voucher)
    }

    pub fn account(&self, number: AccountNumber) -> Result<Option<Account>, StoreError> {
        self.get(CF_ACCOUNTS, &account_key(number))
    }

    /// Plans hold no balance state and are replaced.
    pub fn put_plan(&self, plan: &RatePlan) -> Result<(), StoreError> {
        self.put(CF_PLANS, plan.id.as_str().as_bytes(), plan)
    }

    /// Flush memtables to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(unavailable)
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Unavailable(format!("column family '{name}' not found")))
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<(), StoreError> {
        let cf = self.cf(cf_name)?;
        let bytes = encode(cf_name, key, value)?;
        self.db.put_cf(cf, key, bytes).map_err(unavailable)
    }

    fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>, StoreError> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key).map_err(unavailable)? {
            Some(bytes) => decode(cf_name, key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.commit_lock
            .lock()
            .map_err(|_| StoreError::Unavailable("commit lock poisoned".into()))
    }

    fn insert_new<T: Serialize>(
        &self,
        cf_name: &str,
        key: &[u8],
        value: &T,
    ) -> Result<bool, StoreError> {
        let _guard = self.lock()?;
        let cf = self.cf(cf_name)?;
        if self.db.get_pinned_cf(cf, key).map_err(unavailable)?.is_some() {
            return Ok(false);
        }
        let bytes = encode(cf_name, key, value)?;
        self.db.put_cf(cf, key, bytes).map_err(unavailable)?;
        Ok(true)
    }

    /// Check and write under the commit lock. Readers never observe a
    /// partial settlement because both records go through one batch.
    fn settle_locked(&self, commit: &SettleCommit) -> Result<CommitOutcome, StoreError> {
        let _guard = self.lock()?;

        let voucher_key = commit.voucher.as_str().as_bytes();
        let account_key = account_key(commit.account);

        let Some(mut voucher) = self.get::<TransferVoucher>(CF_VOUCHERS, voucher_key)? else {
            return Ok(CommitOutcome::Missing);
        };
        let Some(mut account) = self.get::<Account>(CF_ACCOUNTS, &account_key)? else {
            return Ok(CommitOutcome::Missing);
        };
        if voucher.used {
            return Ok(CommitOutcome::VoucherUsed);
        }
        if voucher.account != commit.account || account.balance != commit.expected_balance {
            return Ok(CommitOutcome::AccountChanged);
        }

        voucher.used = true;
        account.balance = commit.new_balance;
        account.max_balance = commit.new_max_balance;
        account.valid_until = Some(commit.new_valid_until);

        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_VOUCHERS)?,
            voucher_key,
            encode(CF_VOUCHERS, voucher_key, &voucher)?,
        );
        batch.put_cf(
            self.cf(CF_ACCOUNTS)?,
            &account_key,
            encode(CF_ACCOUNTS, &account_key, &account)?,
        );
        self.db.write(batch).map_err(unavailable)?;
        Ok(CommitOutcome::Committed)
    }
}

fn account_key(number: AccountNumber) -> [u8; 8] {
    number.0.to_be_bytes()
}

fn unavailable(err: rocksdb::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn encode<T: Serialize>(cf: &str, key: &[u8], value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Corrupt {
        key: format!("{cf}/{}", String::from_utf8_lossy(key)),
        reason: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(cf: &str, key: &[u8], bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        key: format!("{cf}/{}", String::from_utf8_lossy(key)),
        reason: e.to_string(),
    })
}

#[async_trait]
impl LedgerStore for RocksLedger {
    async fn find_voucher(&self, code: &VoucherCode) -> Result<Option<TransferVoucher>, StoreError> {
        self.get(CF_VOUCHERS, code.as_str().as_bytes())
    }

    async fn find_account(&self, number: AccountNumber) -> Result<Option<Account>, StoreError> {
        self.account(number)
    }

    async fn find_plan(&self, id: &PlanId) -> Result<Option<RatePlan>, StoreError> {
        self.get(CF_PLANS, id.as_str().as_bytes())
    }

    async fn list_plans(&self) -> Result<Vec<RatePlan>, StoreError> {
        let cf = self.cf(CF_PLANS)?;
        self.db
            .iterator_cf(cf, IteratorMode::Start)
            .map(|item| {
                let (key, value) = item.map_err(unavailable)?;
                decode(CF_PLANS, &key, &value)
            })
            .collect()
    }

    async fn conditional_settle(&self, commit: &SettleCommit) -> Result<CommitOutcome, StoreError> {
        self.settle_locked(commit)
    }

    fn store_id(&self) -> &str {
        "ledger-rocksdb"
    }
}

impl AuditSink for RocksLedger {
    fn record(&self, entry: &AuditEntry) -> Result<(), NotifyError> {
        // v7 ids sort by time, so key order is arrival order.
        self.put(CF_AUDIT, entry.id.as_bytes(), entry)
            .map_err(|e| NotifyError::Audit(e.to_string()))
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, NotifyError> {
        let cf = self
            .cf(CF_AUDIT)
            .map_err(|e| NotifyError::Audit(e.to_string()))?;
        self.db
            .iterator_cf(cf, IteratorMode::End)
            .take(limit)
            .map(|item| {
                let (key, value) = item.map_err(|e| NotifyError::Audit(e.to_string()))?;
                decode(CF_AUDIT, &key, &value).map_err(|e| NotifyError::Audit(e.to_string()))
            })
            .collect()
    }
}
