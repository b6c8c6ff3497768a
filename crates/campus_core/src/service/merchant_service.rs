//! Merchant onboarding use-cases.

use crate::model::merchant::Merchant;
use crate::repo::merchant_repo::MerchantRepository;
use crate::service::{authorize, found, ServiceResult};
use crate::tenant::{MerchantId, Permission, Principal};
use log::info;

pub struct MerchantService<R: MerchantRepository> {
    repo: R,
    principal: Principal,
}

impl<R: MerchantRepository> MerchantService<R> {
    pub fn new(repo: R, principal: Principal) -> Self {
        Self { repo, principal }
    }

    /// Registers a new school under a unique code.
    pub fn register(&self, code: &str, name: impl Into<String>) -> ServiceResult<Merchant> {
        authorize(&self.principal, Permission::ManageMerchants)?;
        let merchant = self.repo.create_merchant(&Merchant::new(code, name))?;
        info!(
            "event=merchant_register module=service status=ok merchant_id={} code={}",
            merchant.uuid, merchant.code
        );
        Ok(merchant)
    }

    pub fn get(&self, id: MerchantId) -> ServiceResult<Merchant> {
        found(self.repo.get_merchant(id)?, "merchant", id)
    }

    pub fn find_by_code(&self, code: &str) -> ServiceResult<Option<Merchant>> {
        Ok(self.repo.find_by_code(code)?)
    }

    pub fn list(&self, include_inactive: bool) -> ServiceResult<Vec<Merchant>> {
        Ok(self.repo.list_merchants(include_inactive)?)
    }

    /// Enables or suspends a merchant.
    pub fn set_active(&self, id: MerchantId, is_active: bool) -> ServiceResult<()> {
        authorize(&self.principal, Permission::ManageMerchants)?;
        self.repo.set_active(id, is_active)?;
        info!(
            "event=merchant_set_active module=service status=ok merchant_id={} is_active={}",
            id, is_active
        );
        Ok(())
    }
}
