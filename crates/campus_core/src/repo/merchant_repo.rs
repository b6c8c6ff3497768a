//! Merchant registry repository.
//!
//! The merchants table is the tenant table itself: its scope column is
//! `uuid`, so a merchant-scoped caller sees exactly its own row.

use crate::model::merchant::{normalize_merchant_code, Merchant};
use crate::repo::{
    ensure_schema_ready, flag, map_write_error, parse_flag, parse_uuid, text, RepoError,
    RepoResult, ScopedQuery,
};
use crate::tenant::{MerchantId, TenantContext};
use rusqlite::{params, Connection, Row};

const MERCHANT_SELECT_SQL: &str = "SELECT uuid, code, name, is_active FROM merchants";

pub trait MerchantRepository {
    fn create_merchant(&self, merchant: &Merchant) -> RepoResult<Merchant>;
    fn get_merchant(&self, id: MerchantId) -> RepoResult<Option<Merchant>>;
    fn find_by_code(&self, code: &str) -> RepoResult<Option<Merchant>>;
    fn list_merchants(&self, include_inactive: bool) -> RepoResult<Vec<Merchant>>;
    fn set_active(&self, id: MerchantId, is_active: bool) -> RepoResult<()>;
}

pub struct SqliteMerchantRepository<'conn> {
    conn: &'conn Connection,
    tenant: TenantContext,
}

impl<'conn> SqliteMerchantRepository<'conn> {
    pub fn try_new(conn: &'conn Connection, tenant: TenantContext) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn, tenant })
    }
}

impl MerchantRepository for SqliteMerchantRepository<'_> {
    fn create_merchant(&self, merchant: &Merchant) -> RepoResult<Merchant> {
        merchant.validate()?;

        self.conn
            .execute(
                "INSERT INTO merchants (uuid, code, name, is_active) VALUES (?1, ?2, ?3, ?4);",
                params![
                    merchant.uuid.to_string(),
                    merchant.code.as_str(),
                    merchant.name.as_str(),
                    merchant.is_active,
                ],
            )
            .map_err(|err| map_write_error(err, "merchant code already registered"))?;

        Ok(merchant.clone())
    }

    fn get_merchant(&self, id: MerchantId) -> RepoResult<Option<Merchant>> {
        ScopedQuery::select(MERCHANT_SELECT_SQL, "uuid", &self.tenant.scope)
            .eq("uuid", text(id.to_string()))
            .fetch_optional(self.conn, parse_merchant_row)
    }

    fn find_by_code(&self, code: &str) -> RepoResult<Option<Merchant>> {
        ScopedQuery::select(MERCHANT_SELECT_SQL, "uuid", &self.tenant.scope)
            .eq("code", text(normalize_merchant_code(code)))
            .fetch_optional(self.conn, parse_merchant_row)
    }

    fn list_merchants(&self, include_inactive: bool) -> RepoResult<Vec<Merchant>> {
        let mut query = ScopedQuery::select(MERCHANT_SELECT_SQL, "uuid", &self.tenant.scope);
        if !include_inactive {
            query = query.eq("is_active", flag(true));
        }
        query
            .order_by("code ASC")
            .fetch_all(self.conn, parse_merchant_row)
    }

    fn set_active(&self, id: MerchantId, is_active: bool) -> RepoResult<()> {
        let changed = ScopedQuery::mutate(
            "UPDATE merchants SET is_active = ?, updated_at = (strftime('%s', 'now') * 1000)",
            vec![flag(is_active)],
            "uuid",
            &self.tenant.scope,
        )
        .eq("uuid", text(id.to_string()))
        .execute(self.conn)?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "merchant",
                id,
            });
        }
        Ok(())
    }
}

fn parse_merchant_row(row: &Row<'_>) -> RepoResult<Merchant> {
    let uuid_text: String = row.get("uuid")?;
    Ok(Merchant {
        uuid: parse_uuid(&uuid_text, "merchants.uuid")?,
        code: row.get("code")?,
        name: row.get("name")?,
        is_active: parse_flag(row.get("is_active")?, "merchants.is_active")?,
    })
}
