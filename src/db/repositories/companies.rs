use anyhow::{Context, Result};
use rusqlite::{params, Row};

use crate::{
    db::{helpers::parse_payment_type, Database},
    models::{Company, Coordinate},
};

fn row_to_company(row: &Row) -> Result<Company> {
    let base_latitude: Option<f64> = row.get("base_latitude")?;
    let base_longitude: Option<f64> = row.get("base_longitude")?;
    let payment_type: String = row.get("payment_type")?;

    Ok(Company {
        id: row.get("id")?,
        name: row.get("name")?,
        base_location: match (base_latitude, base_longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)),
            _ => None,
        },
        payment_type: parse_payment_type(&payment_type)?,
        daily_rate: row.get("daily_rate")?,
        delivery_fee: row.get("delivery_fee")?,
    })
}

impl Database {
    /// Insert or replace a company by id.
    pub async fn save_company(&self, company: &Company) -> Result<()> {
        let record = company.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO companies (id, name, base_latitude, base_longitude, payment_type, daily_rate, delivery_fee)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     base_latitude = excluded.base_latitude,
                     base_longitude = excluded.base_longitude,
                     payment_type = excluded.payment_type,
                     daily_rate = excluded.daily_rate,
                     delivery_fee = excluded.delivery_fee",
                params![
                    record.id,
                    record.name,
                    record.base_location.map(|c| c.latitude),
                    record.base_location.map(|c| c.longitude),
                    record.payment_type.as_str(),
                    record.daily_rate,
                    record.delivery_fee,
                ],
            )
            .with_context(|| "failed to save company")?;
            Ok(())
        })
        .await
    }

    pub async fn get_company(&self, company_id: &str) -> Result<Option<Company>> {
        let company_id = company_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, base_latitude, base_longitude, payment_type, daily_rate, delivery_fee
                 FROM companies
                 WHERE id = ?1",
            )?;
            let mut rows = stmt.query(params![company_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(row_to_company(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn list_companies(&self) -> Result<Vec<Company>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, base_latitude, base_longitude, payment_type, daily_rate, delivery_fee
                 FROM companies
                 ORDER BY name ASC",
            )?;

            let mut rows = stmt.query([])?;
            let mut companies = Vec::new();
            while let Some(row) = rows.next()? {
                companies.push(row_to_company(row)?);
            }
            Ok(companies)
        })
        .await
    }

    /// Registers the depot for a company. Returns `false` if the company does not exist.
    pub async fn set_company_base_location(
        &self,
        company_id: &str,
        base: Coordinate,
    ) -> Result<bool> {
        let company_id = company_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE companies
                     SET base_latitude = ?1, base_longitude = ?2
                     WHERE id = ?3",
                    params![base.latitude, base.longitude, company_id],
                )
                .with_context(|| "failed to set company base location")?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn delete_company(&self, company_id: &str) -> Result<bool> {
        let company_id = company_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn
                .execute("DELETE FROM companies WHERE id = ?1", params![company_id])
                .with_context(|| "failed to delete company")?;
            Ok(rows_affected > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        db::test_support::temp_database,
        models::{Company, Coordinate, PaymentType},
    };

    #[tokio::test]
    async fn save_get_and_update_base() {
        let (db, _dir) = temp_database();
        let mut company = Company::new("acme", "Acme Express");
        company.payment_type = PaymentType::Fixed;
        company.delivery_fee = 4.5;
        db.save_company(&company).await.unwrap();

        let stored = db.get_company("acme").await.unwrap().unwrap();
        assert_eq!(stored, company);
        assert_eq!(stored.base_location, None);

        let depot = Coordinate::new(-23.5, -46.6);
        assert!(db.set_company_base_location("acme", depot).await.unwrap());
        assert!(!db
            .set_company_base_location("nobody", depot)
            .await
            .unwrap());

        let stored = db.get_company("acme").await.unwrap().unwrap();
        assert_eq!(stored.base_location, Some(depot));
    }

    #[tokio::test]
    async fn list_sorted_by_name_and_delete() {
        let (db, _dir) = temp_database();
        db.save_company(&Company::new("2", "Zeta")).await.unwrap();
        db.save_company(&Company::new("1", "Alpha")).await.unwrap();

        let names: Vec<_> = db
            .list_companies()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);

        assert!(db.delete_company("2").await.unwrap());
        assert!(!db.delete_company("2").await.unwrap());
        assert_eq!(db.list_companies().await.unwrap().len(), 1);
    }
}
