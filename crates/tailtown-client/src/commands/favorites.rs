use tracing::{debug, info};

use crate::commands::listings::ListingDto;
use crate::error::ClientError;
use crate::state::ClientState;

fn pet_id_arg(pet_id: &str) -> Result<String, ClientError> {
    let pet_id = pet_id.trim();
    if pet_id.is_empty() {
        return Err(ClientError::invalid("User ID and Pet ID are required."));
    }
    Ok(pet_id.to_string())
}

/// Mark a listing as favourite.  Returns the updated favourite ids.
pub async fn add_favorite(state: &ClientState, pet_id: &str) -> Result<Vec<String>, ClientError> {
    let user = state.session.require_user()?;
    let pet_id = pet_id_arg(pet_id)?;

    let uid = user.uid.clone();
    let pet = pet_id.clone();
    let ids = state
        .backend
        .call(move |db| db.add_favorite(&uid, &uid, &pet))
        .await?;
    info!(uid = %user.uid, %pet_id, "favorite added");
    Ok(ids)
}

pub async fn remove_favorite(
    state: &ClientState,
    pet_id: &str,
) -> Result<Vec<String>, ClientError> {
    let user = state.session.require_user()?;
    let pet_id = pet_id_arg(pet_id)?;

    let uid = user.uid.clone();
    let pet = pet_id.clone();
    let ids = state
        .backend
        .call(move |db| db.remove_favorite(&uid, &uid, &pet))
        .await?;
    info!(uid = %user.uid, %pet_id, "favorite removed");
    Ok(ids)
}

/// Listings behind the signed-in user's favourites, in the order they were
/// added.  Ids whose listing no longer exists are skipped.
pub async fn favorite_listings(state: &ClientState) -> Result<Vec<ListingDto>, ClientError> {
    let user = state.session.require_user()?;

    let uid = user.uid.clone();
    let listings = state
        .backend
        .call(move |db| {
            let profile = db.get_user_profile(&uid)?;
            let mut found = Vec::with_capacity(profile.favorite_pet_ids.len());
            for id in &profile.favorite_pet_ids {
                match db.get_listing(id) {
                    Ok(listing) => found.push(listing),
                    Err(tailtown_store::StoreError::NotFound) => {
                        debug!(pet_id = %id, "favorite listing no longer exists");
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(found)
        })
        .await
        .map_err(|e| e.with_not_found("Profile not found"))?;

    Ok(listings.into_iter().map(ListingDto::from).collect())
}
