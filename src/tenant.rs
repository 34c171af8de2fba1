use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};
use ulid::Ulid;

use crate::compactor;
use crate::engine::{check_email, check_name, Engine, EngineError, Entity};
use crate::limits::*;
use crate::model::{Company, Role, User};

/// Directory of companies. Each company gets its own Engine + journal +
/// compactor; the directory keeps the cross-company indexes (name,
/// certification code, e-mail) that make those globally unique.
pub struct TenantManager {
    by_id: DashMap<Ulid, Arc<Engine>>,
    by_name: DashMap<String, Ulid>,
    by_certification: DashMap<String, Ulid>,
    /// E-mail → (company id, user id).
    emails: DashMap<String, (Ulid, Ulid)>,
    data_dir: PathBuf,
    compact_threshold: u64,
    /// Serializes company and user registration.
    registration: Mutex<()>,
}

impl TenantManager {
    /// Load every company journal under `data_dir`. Must run inside a Tokio
    /// runtime: each engine spawns its journal writer and compactor.
    pub fn open(data_dir: PathBuf, compact_threshold: u64) -> io::Result<Self> {
        std::fs::create_dir_all(&data_dir)?;
        let tm = Self {
            by_id: DashMap::new(),
            by_name: DashMap::new(),
            by_certification: DashMap::new(),
            emails: DashMap::new(),
            data_dir,
            compact_threshold,
            registration: Mutex::new(()),
        };

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&tm.data_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "wal"))
            .collect();
        paths.sort();
        for path in paths {
            let engine = Arc::new(Engine::open(path.clone())?);
            tm.index(&path, engine);
        }

        metrics::gauge!(crate::observability::COMPANIES_ACTIVE).set(tm.by_id.len() as f64);
        info!("loaded {} companies from {}", tm.by_id.len(), tm.data_dir.display());
        Ok(tm)
    }

    fn index(&self, path: &Path, engine: Arc<Engine>) {
        let company = engine.company().clone();
        if self.by_name.contains_key(&company.name) {
            warn!("skipping {}: company name {} already loaded", path.display(), company.name);
            return;
        }
        for user in engine.list_users() {
            if self.emails.contains_key(&user.email) {
                warn!("e-mail {} registered in more than one company", user.email);
                continue;
            }
            self.emails.insert(user.email, (company.id, user.id));
        }
        self.by_name.insert(company.name.clone(), company.id);
        self.by_certification.insert(company.certification.clone(), company.id);
        self.start(engine);
    }

    fn start(&self, engine: Arc<Engine>) {
        let id = engine.company().id;
        self.by_id.insert(id, engine.clone());
        let threshold = self.compact_threshold;
        tokio::spawn(async move {
            compactor::run_compactor(engine, threshold).await;
        });
    }

    pub fn get(&self, company_id: &Ulid) -> Option<Arc<Engine>> {
        self.by_id.get(company_id).map(|e| e.value().clone())
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<Engine>> {
        let id = *self.by_name.get(name)?.value();
        self.get(&id)
    }

    pub fn by_certification(&self, code: &str) -> Option<Arc<Engine>> {
        let id = *self.by_certification.get(code)?.value();
        self.get(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Register a company together with its first ADMIN.
    pub async fn register_company(
        &self,
        name: String,
        certification: String,
        admin_email: String,
        admin_username: String,
    ) -> Result<(Arc<Engine>, User), EngineError> {
        check_name(&name, "company")?;
        if certification.trim().is_empty() || certification.len() > MAX_CERTIFICATION_LEN {
            return Err(EngineError::validation("invalid certification code"));
        }
        check_email(&admin_email)?;
        check_name(&admin_username, "user")?;

        let _registration = self.registration.lock().await;
        if self.by_id.len() >= MAX_COMPANIES {
            return Err(EngineError::validation("too many companies"));
        }
        if self.by_name.contains_key(&name) {
            return Err(EngineError::AlreadyExists(format!("company {name}")));
        }
        if self.by_certification.contains_key(&certification) {
            return Err(EngineError::AlreadyExists("certification code".into()));
        }
        if self.emails.contains_key(&admin_email) {
            return Err(EngineError::AlreadyExists(admin_email));
        }

        let company = Company { id: Ulid::new(), name, certification };
        let path = self.data_dir.join(format!("{}.wal", company.id));
        let admin = User {
            id: Ulid::new(),
            email: admin_email,
            username: admin_username,
            role: Role::Admin,
        };
        let engine = Arc::new(
            Engine::create(path, company.clone(), admin.clone())
                .map_err(|e| EngineError::WalError(e.to_string()))?,
        );

        self.by_name.insert(company.name.clone(), company.id);
        self.by_certification.insert(company.certification.clone(), company.id);
        self.emails.insert(admin.email.clone(), (company.id, admin.id));
        self.start(engine.clone());
        metrics::gauge!(crate::observability::COMPANIES_ACTIVE).set(self.by_id.len() as f64);
        info!("registered company {} ({})", company.name, company.id);
        Ok((engine, admin))
    }

    /// Add a USER to the company owning `certification`.
    pub async fn join_company(
        &self,
        certification: &str,
        email: String,
        username: String,
    ) -> Result<(Arc<Engine>, User), EngineError> {
        let _registration = self.registration.lock().await;
        let engine = self
            .by_certification(certification)
            .ok_or_else(|| EngineError::not_found(Entity::Company, "certification code"))?;
        if self.emails.contains_key(&email) {
            return Err(EngineError::AlreadyExists(email));
        }
        let user = engine
            .register_user(Ulid::new(), email, username, Role::User)
            .await?;
        self.emails
            .insert(user.email.clone(), (engine.company().id, user.id));
        Ok((engine, user))
    }
}
