//! Insert and query operations for pet [`Listing`]s.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use tailtown_shared::types::ListingStatus;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{not_found, OptionalNotFound, Result};
use crate::models::{Listing, ListingFilter, NewListing};
use crate::rules;
use crate::timestamp::{self, conversion};

const LISTING_COLUMNS: &str =
    "id, name, pet_type, breed, age, description, image_url, seller_id, status, created_at";

impl Database {
    /// Insert a listing on behalf of `actor`, who must be a Seller or Admin
    /// and named as the seller.
    pub fn insert_listing(&self, actor: &str, new: &NewListing) -> Result<Listing> {
        let actor_profile = self.get_user_profile(actor).optional_not_found()?;
        rules::ensure_can_list(actor, actor_profile.as_ref(), &new.seller_id)?;

        let listing = Listing {
            id: Uuid::new_v4().simple().to_string(),
            name: new.name.clone(),
            pet_type: new.pet_type,
            breed: new.breed.clone(),
            age: new.age,
            description: new.description.clone(),
            image_url: new.image_url.clone(),
            seller_id: new.seller_id.clone(),
            status: ListingStatus::Available,
            created_at: timestamp::now(),
        };

        self.conn().execute(
            "INSERT INTO pets (id, name, pet_type, breed, age, description, image_url,
                               seller_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                listing.id,
                listing.name,
                listing.pet_type.as_str(),
                listing.breed,
                listing.age,
                listing.description,
                listing.image_url,
                listing.seller_id,
                listing.status.as_str(),
                timestamp::encode(&listing.created_at),
            ],
        )?;

        tracing::info!(pet_id = %listing.id, seller = %listing.seller_id, "listing created");
        Ok(listing)
    }

    /// Listings matching `filter`, newest first.
    pub fn query_listings(&self, filter: &ListingFilter) -> Result<Vec<Listing>> {
        let mut sql = format!("SELECT {LISTING_COLUMNS} FROM pets WHERE 1 = 1");
        let mut args: Vec<Value> = Vec::new();

        if let Some(pet_type) = filter.pet_type {
            args.push(Value::Text(pet_type.as_str().to_string()));
            sql.push_str(&format!(" AND pet_type = ?{}", args.len()));
        }
        if let Some(ref breed) = filter.breed {
            args.push(Value::Text(breed.clone()));
            sql.push_str(&format!(" AND breed = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY created_at DESC, seq DESC");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), row_to_listing)?;

        let mut listings = Vec::new();
        for row in rows {
            listings.push(row?);
        }
        tracing::debug!(?filter, count = listings.len(), "listings queried");
        Ok(listings)
    }

    /// Fetch a single listing by id.
    pub fn get_listing(&self, id: &str) -> Result<Listing> {
        self.conn()
            .query_row(
                &format!("SELECT {LISTING_COLUMNS} FROM pets WHERE id = ?1"),
                params![id],
                row_to_listing,
            )
            .map_err(not_found)
    }
}

fn row_to_listing(row: &rusqlite::Row<'_>) -> rusqlite::Result<Listing> {
    let pet_type_str: String = row.get(2)?;
    let status_str: String = row.get(8)?;
    let created_str: String = row.get(9)?;

    Ok(Listing {
        id: row.get(0)?,
        name: row.get(1)?,
        pet_type: pet_type_str.parse().map_err(|e| conversion(2, e))?,
        breed: row.get(3)?,
        age: row.get(4)?,
        description: row.get(5)?,
        image_url: row.get(6)?,
        seller_id: row.get(7)?,
        status: status_str.parse().map_err(|e| conversion(8, e))?,
        created_at: timestamp::decode(9, &created_str)?,
    })
}
