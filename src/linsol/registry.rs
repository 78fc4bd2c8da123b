//! Process-wide backend registry
//!
//! Backends are looked up by name. The built-in backends are registered the
//! first time the registry is touched; applications add their own with
//! [`register_backend`].

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use log::{debug, warn};
use parking_lot::RwLock;

use crate::error::{Error, Result};

use super::backend::FactorizationBackend;
use super::backends::{CholeskyBackend, DenseLuBackend, QrBackend, SparseLuBackend};
use super::options::LinsolOptions;

/// Constructor of a backend instance
pub type BackendFactory =
    Arc<dyn Fn(&LinsolOptions) -> Box<dyn FactorizationBackend> + Send + Sync>;

#[derive(Clone)]
struct BackendEntry {
    doc: String,
    factory: BackendFactory,
}

static BACKEND_REGISTRY: OnceLock<RwLock<HashMap<String, BackendEntry>>> = OnceLock::new();

fn get_registry() -> &'static RwLock<HashMap<String, BackendEntry>> {
    BACKEND_REGISTRY.get_or_init(|| RwLock::new(builtin_backends()))
}

fn entry(doc: &str, factory: BackendFactory) -> BackendEntry {
    BackendEntry {
        doc: doc.to_string(),
        factory,
    }
}

fn dense_lu(opts: &LinsolOptions) -> Box<dyn FactorizationBackend> {
    Box::new(DenseLuBackend::new(opts.clone()))
}

fn sparse_lu(opts: &LinsolOptions) -> Box<dyn FactorizationBackend> {
    Box::new(SparseLuBackend::new(opts.clone()))
}

fn qr(opts: &LinsolOptions) -> Box<dyn FactorizationBackend> {
    Box::new(QrBackend::new(opts.clone()))
}

fn cholesky(opts: &LinsolOptions) -> Box<dyn FactorizationBackend> {
    Box::new(CholeskyBackend::new(opts.clone()))
}

fn builtin_backends() -> HashMap<String, BackendEntry> {
    let mut map = HashMap::new();
    map.insert(
        DenseLuBackend::NAME.to_string(),
        entry(
            "Dense LU factorization with partial pivoting",
            Arc::new(dense_lu),
        ),
    );
    map.insert(
        SparseLuBackend::NAME.to_string(),
        entry(
            "Left-looking sparse LU factorization with partial pivoting",
            Arc::new(sparse_lu),
        ),
    );
    map.insert(
        QrBackend::NAME.to_string(),
        entry(
            "Dense Householder QR with column pivoting; reveals numerical rank",
            Arc::new(qr),
        ),
    );
    map.insert(
        CholeskyBackend::NAME.to_string(),
        entry(
            "Sparse Cholesky factorization for symmetric positive definite matrices",
            Arc::new(cholesky),
        ),
    );
    map
}

/// Register a backend under `name`
///
/// Replaces (with a warning) any backend previously registered under the
/// same name, including built-ins.
pub fn register_backend<F>(name: &str, doc: &str, factory: F)
where
    F: Fn(&LinsolOptions) -> Box<dyn FactorizationBackend> + Send + Sync + 'static,
{
    let mut registry = get_registry().write();
    if registry.contains_key(name) {
        warn!("replacing linear solver backend '{}'", name);
    } else {
        debug!("registered linear solver backend '{}'", name);
    }
    registry.insert(name.to_string(), entry(doc, Arc::new(factory)));
}

/// True if a backend is registered under `name`
pub fn has_backend(name: &str) -> bool {
    get_registry().read().contains_key(name)
}

/// Make sure a backend is available
///
/// Backends are compiled in, so there is nothing to load; this only reports
/// whether `name` can be used.
pub fn load_backend(name: &str) -> Result<()> {
    if has_backend(name) {
        Ok(())
    } else {
        Err(Error::BackendNotFound {
            name: name.to_string(),
        })
    }
}

/// Documentation string of a registered backend
pub fn backend_doc(name: &str) -> Result<String> {
    get_registry()
        .read()
        .get(name)
        .map(|e| e.doc.clone())
        .ok_or_else(|| Error::BackendNotFound {
            name: name.to_string(),
        })
}

/// Names of all registered backends, sorted
pub fn backend_names() -> Vec<String> {
    let mut names: Vec<String> = get_registry().read().keys().cloned().collect();
    names.sort();
    names
}

/// Instantiate the backend registered under `name`
pub fn create_backend(name: &str, options: &LinsolOptions) -> Result<Box<dyn FactorizationBackend>> {
    // Clone the factory out so user factories never run under the lock
    let factory = get_registry()
        .read()
        .get(name)
        .map(|e| Arc::clone(&e.factory))
        .ok_or_else(|| Error::BackendNotFound {
            name: name.to_string(),
        })?;
    Ok(factory(options))
}
