//! Generic record tables over sled trees
use super::error::MarketError;
use std::marker::PhantomData;
use tracing::debug;

/// A CBOR-encoded aggregate stored under a string key.
pub trait Record: Sized + minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()> {
    /// Name of the aggregate, used in not-found errors.
    const KIND: &'static str;

    fn key(&self) -> String;
}

/// Outcome of an in-place update closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Persist the mutated record.
    Write,
    /// Leave the stored record as is and return it.
    Keep,
    /// Leave the stored record as is and report it as absent.
    Discard,
}

pub(crate) fn encode<T: Record>(record: &T) -> Result<Vec<u8>, MarketError> {
    minicbor::to_vec(record).map_err(|e| MarketError::Encode(e.to_string()))
}

pub struct Table<T> {
    tree: sled::Tree,
    _record: PhantomData<T>,
}

impl<T> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: Record> Table<T> {
    pub fn open(db: &sled::Db, name: &str) -> Result<Self, MarketError> {
        Ok(Self {
            tree: db.open_tree(name)?,
            _record: PhantomData,
        })
    }

    pub(crate) fn tree(&self) -> &sled::Tree {
        &self.tree
    }

    pub fn get(&self, key: &str) -> Result<Option<T>, MarketError> {
        match self.tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every record in key order.
    pub fn list(&self) -> Result<Vec<T>, MarketError> {
        self.tree
            .iter()
            .map(|item| {
                let (_, value) = item?;
                Ok(minicbor::decode(&value)?)
            })
            .collect()
    }

    pub fn filter<P>(&self, predicate: P) -> Result<Vec<T>, MarketError>
    where
        P: Fn(&T) -> bool,
    {
        let mut matched = vec![];
        for record in self.list()? {
            if predicate(&record) {
                matched.push(record);
            }
        }
        Ok(matched)
    }

    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<T>, MarketError> {
        self.tree
            .scan_prefix(prefix.as_bytes())
            .map(|item| {
                let (_, value) = item?;
                Ok(minicbor::decode(&value)?)
            })
            .collect()
    }

    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<sled::IVec>, MarketError> {
        self.tree
            .scan_prefix(prefix.as_bytes())
            .keys()
            .map(|key| Ok(key?))
            .collect()
    }

    /// Inserts a record whose key must not exist yet.
    pub fn insert_new(&self, record: &T) -> Result<(), MarketError> {
        let key = record.key();
        let bytes = encode(record)?;
        match self
            .tree
            .compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(bytes))?
        {
            Ok(()) => Ok(()),
            Err(_) => Err(MarketError::InvalidInput(format!(
                "{} {key} already exists",
                T::KIND
            ))),
        }
    }

    /// Read-modify-write guarded by compare-and-swap.
    ///
    /// `apply` runs against the freshly read record and is re-run whenever a
    /// concurrent writer replaced the row in between. Returns `None` if the key
    /// is absent or the closure discards the change.
    pub fn update<F>(&self, key: &str, mut apply: F) -> Result<Option<T>, MarketError>
    where
        F: FnMut(&mut T) -> Result<Change, MarketError>,
    {
        loop {
            let Some(current) = self.tree.get(key.as_bytes())? else {
                return Ok(None);
            };
            let mut record: T = minicbor::decode(&current)?;

            match apply(&mut record)? {
                Change::Discard => return Ok(None),
                Change::Keep => return Ok(Some(record)),
                Change::Write => {}
            }

            let updated = encode(&record)?;
            match self
                .tree
                .compare_and_swap(key.as_bytes(), Some(&current), Some(updated))?
            {
                Ok(()) => return Ok(Some(record)),
                Err(_) => {
                    debug!(kind = T::KIND, key, "Concurrent write detected, retrying update");
                }
            }
        }
    }

    pub fn watch(&self) -> sled::Subscriber {
        self.tree.watch_prefix(Vec::<u8>::new())
    }
}
