use serde::Serialize;
use tailtown_shared::constants::{DEFAULT_LOCAL_ROLE, DEFAULT_SELLER_ROLE, UNKNOWN_ROLE};
use tailtown_shared::types::{short_id, PetType};
use tailtown_store::{ChatSession, Listing, ListingFilter, NewListing};
use tracing::{info, warn};

use crate::chat::{self, Participant};
use crate::error::ClientError;
use crate::state::ClientState;

const INCOMPLETE_SELLER: &str =
    "Seller information is incomplete or invalid, cannot initiate chat.";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListingDto {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub pet_type: String,
    pub breed: String,
    pub age: u32,
    pub description: String,
    pub image_url: Option<String>,
    pub seller_id: String,
    pub status: String,
    pub created_at: String,
}

impl From<Listing> for ListingDto {
    fn from(l: Listing) -> Self {
        Self {
            id: l.id,
            name: l.name,
            pet_type: l.pet_type.as_str().to_string(),
            breed: l.breed,
            age: l.age,
            description: l.description,
            image_url: l.image_url,
            seller_id: l.seller_id,
            status: l.status.as_str().to_string(),
            created_at: l.created_at.to_rfc3339(),
        }
    }
}

/// Raw input of the create-listing form.
#[derive(Debug, Clone, Default)]
pub struct CreateListingForm {
    pub name: String,
    pub pet_type: String,
    pub breed: String,
    pub age: String,
    pub description: String,
    pub image_url: String,
}

impl CreateListingForm {
    fn validate(&self, seller_id: &str) -> Result<NewListing, ClientError> {
        let required = |value: &str, field: &str| {
            let value = value.trim();
            if value.is_empty() {
                Err(ClientError::invalid(format!("{field} is required")))
            } else {
                Ok(value.to_string())
            }
        };

        let name = required(&self.name, "Name")?;
        let breed = required(&self.breed, "Breed")?;
        let description = required(&self.description, "Description")?;

        let pet_type: PetType = self
            .pet_type
            .trim()
            .parse()
            .map_err(|_| {
                ClientError::invalid(format!("Unknown pet type: {}", self.pet_type.trim()))
            })?;

        let age: u32 = self
            .age
            .trim()
            .parse()
            .map_err(|_| ClientError::invalid("Age must be a whole number of years, 0 or more"))?;

        let image_url = Some(self.image_url.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Ok(NewListing {
            name,
            pet_type,
            breed,
            age,
            description,
            image_url,
            seller_id: seller_id.to_string(),
        })
    }
}

/// Publish a listing as the signed-in user.  Whether the user's role may do
/// so is decided by the store.
pub async fn create_listing(
    state: &ClientState,
    form: &CreateListingForm,
) -> Result<ListingDto, ClientError> {
    let user = state.session.require_user()?;
    let new = form.validate(&user.uid)?;

    let actor = user.uid.clone();
    let listing = state
        .backend
        .call(move |db| db.insert_listing(&actor, &new))
        .await?;

    info!(pet_id = %listing.id, seller = %user.uid, "listing published");
    Ok(listing.into())
}

/// Exact-match search, newest first.  Blank filters are ignored.
pub async fn search_listings(
    state: &ClientState,
    pet_type: Option<&str>,
    breed: Option<&str>,
) -> Result<Vec<ListingDto>, ClientError> {
    let pet_type = match pet_type.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => Some(
            t.parse::<PetType>()
                .map_err(|_| ClientError::invalid(format!("Unknown pet type: {t}")))?,
        ),
        None => None,
    };
    let filter = ListingFilter {
        pet_type,
        breed: breed
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string),
    };

    let listings = state.backend.call(move |db| db.query_listings(&filter)).await?;
    Ok(listings.into_iter().map(ListingDto::from).collect())
}

/// Seller block of the detail view.  `error` is set whenever the seller
/// could not be resolved to a profile; the view still renders.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SellerInfo {
    pub uid: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub role: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PetDetailView {
    pub listing: ListingDto,
    pub seller: SellerInfo,
}

/// A listing with its seller.  A missing or unreadable seller profile
/// degrades to placeholder seller info instead of failing.
pub async fn listing_detail(
    state: &ClientState,
    pet_id: &str,
) -> Result<PetDetailView, ClientError> {
    let pet_id = pet_id.trim();
    if pet_id.is_empty() {
        return Err(ClientError::invalid("Invalid or missing Pet ID"));
    }

    let id = pet_id.to_string();
    let listing = state
        .backend
        .call(move |db| db.get_listing(&id))
        .await
        .map_err(|e| e.with_not_found(format!("Pet {pet_id} not found")))?;

    let seller = resolve_seller(state, &listing.seller_id).await;
    Ok(PetDetailView {
        listing: listing.into(),
        seller,
    })
}

async fn resolve_seller(state: &ClientState, seller_id: &str) -> SellerInfo {
    if seller_id.trim().is_empty() {
        warn!("listing has no seller id");
        return SellerInfo {
            uid: None,
            name: "Seller Not Specified for this Pet".to_string(),
            email: None,
            role: UNKNOWN_ROLE.to_string(),
            error: Some("Pet listing does not have a valid seller ID.".to_string()),
        };
    }

    let uid = seller_id.to_string();
    match state.backend.call(move |db| db.get_user_profile(&uid)).await {
        Ok(profile) => SellerInfo {
            name: if profile.name.trim().is_empty() {
                format!("Seller (ID: {})", short_id(&profile.id))
            } else {
                profile.name
            },
            uid: Some(profile.id),
            email: Some(profile.email).filter(|e| !e.is_empty()),
            role: profile.role.as_str().to_string(),
            error: None,
        },
        Err(ClientError::NotFound(_)) => {
            warn!(seller = %seller_id, "listing seller has no profile");
            SellerInfo {
                uid: Some(seller_id.to_string()),
                name: "Seller Account Not Found".to_string(),
                email: None,
                role: UNKNOWN_ROLE.to_string(),
                error: Some(
                    "Seller account associated with this pet could not be found.".to_string(),
                ),
            }
        }
        Err(e) => {
            warn!(seller = %seller_id, error = %e, "failed to load seller");
            SellerInfo {
                uid: Some(seller_id.to_string()),
                name: "Could not load seller information".to_string(),
                email: None,
                role: UNKNOWN_ROLE.to_string(),
                error: Some(format!("Error fetching seller: {e}")),
            }
        }
    }
}

/// Open (or create) the chat between the signed-in user and `seller`.
pub async fn contact_seller(
    state: &ClientState,
    seller: &SellerInfo,
) -> Result<ChatSession, ClientError> {
    let user = state.session.require_user()?;

    let seller_uid = seller
        .uid
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ClientError::invalid(INCOMPLETE_SELLER))?;
    if seller_uid == user.uid {
        return Err(ClientError::invalid("You cannot start a chat with yourself."));
    }

    let mut local = Participant::new(user.uid.clone())
        .with_email(user.email.clone())
        .with_role(
            user.role()
                .map(|r| r.as_str())
                .unwrap_or(DEFAULT_LOCAL_ROLE),
        );
    if let Some(ref profile) = user.profile {
        local = local.named(profile.name.clone());
    }

    let mut remote = Participant::new(seller_uid)
        .named(seller.name.clone())
        .with_role(if seller.role.trim().is_empty() {
            DEFAULT_SELLER_ROLE
        } else {
            seller.role.as_str()
        });
    if let Some(ref email) = seller.email {
        remote = remote.with_email(email.clone());
    }

    chat::get_or_create_session(&state.backend, &local, &remote).await
}

#[cfg(test)]
mod tests {
    use tailtown_shared::types::Role;

    use super::*;

    async fn signed_in(state: &ClientState, email: &str, name: &str, role: Role) -> String {
        let (session, _) = state.auth.register(email, "secret1", name, role).await.unwrap();
        state.session.signed_in_as(&session.uid).await.unwrap();
        session.uid
    }

    fn form(pet_type: &str, breed: &str) -> CreateListingForm {
        CreateListingForm {
            name: format!("{breed} pal"),
            pet_type: pet_type.into(),
            breed: breed.into(),
            age: "3".into(),
            description: "gentle".into(),
            image_url: "  ".into(),
        }
    }

    #[test]
    fn form_validation() {
        let ok = form("Cat", "Siamese").validate("s1").unwrap();
        assert_eq!(ok.pet_type, PetType::Cat);
        assert_eq!(ok.age, 3);
        assert_eq!(ok.image_url, None);

        let mut bad_age = form("Cat", "Siamese");
        bad_age.age = "-1".into();
        assert!(bad_age.validate("s1").is_err());

        let mut bad_type = form("Dragon", "Red");
        assert!(bad_type.validate("s1").is_err());
        bad_type.pet_type = "Dog".into();
        bad_type.breed = " ".into();
        assert!(bad_type.validate("s1").is_err());
    }

    #[tokio::test]
    async fn create_requires_sign_in_and_a_listing_role() {
        let state = ClientState::in_memory().unwrap();
        state.session.resolved().await.unwrap();
        assert!(matches!(
            create_listing(&state, &form("Dog", "Pug")).await,
            Err(ClientError::NotSignedIn)
        ));

        signed_in(&state, "buyer@example.com", "Bo", Role::Buyer).await;
        assert!(matches!(
            create_listing(&state, &form("Dog", "Pug")).await,
            Err(ClientError::PermissionDenied(_))
        ));
    }

    #[tokio::test]
    async fn search_by_type_returns_newest_cats() {
        let state = ClientState::in_memory().unwrap();
        signed_in(&state, "seller@example.com", "Sal", Role::Seller).await;

        let mut cats = Vec::new();
        let stock = [
            ("Cat", "Siamese"),
            ("Dog", "Beagle"),
            ("Cat", "Persian"),
            ("Dog", "Pug"),
            ("Dog", "Corgi"),
        ];
        for (t, b) in stock {
            let listing = create_listing(&state, &form(t, b)).await.unwrap();
            assert_eq!(listing.status, "available");
            if t == "Cat" {
                cats.push(listing.id);
            }
        }
        cats.reverse();

        let found = search_listings(&state, Some("Cat"), None).await.unwrap();
        let ids: Vec<String> = found.into_iter().map(|l| l.id).collect();
        assert_eq!(ids, cats);

        assert_eq!(search_listings(&state, Some(" "), Some("")).await.unwrap().len(), 5);
        assert_eq!(search_listings(&state, None, Some("Pug")).await.unwrap().len(), 1);
        assert!(matches!(
            search_listings(&state, Some("Dragon"), None).await,
            Err(ClientError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn detail_resolves_seller() {
        let state = ClientState::in_memory().unwrap();
        let seller = signed_in(&state, "sal@example.com", "Sal", Role::Seller).await;
        let listing = create_listing(&state, &form("Bird", "Parrot")).await.unwrap();

        let view = listing_detail(&state, &listing.id).await.unwrap();
        assert_eq!(view.seller.uid.as_deref(), Some(seller.as_str()));
        assert_eq!(view.seller.name, "Sal");
        assert_eq!(view.seller.role, "Seller");
        assert!(view.seller.error.is_none());

        assert!(matches!(listing_detail(&state, " ").await, Err(ClientError::InvalidArgument(_))));
        assert!(matches!(listing_detail(&state, "nope").await, Err(ClientError::NotFound(_))));
    }

    #[tokio::test]
    async fn orphaned_listing_shows_placeholder_seller() {
        let state = ClientState::in_memory().unwrap();
        state.session.resolved().await.unwrap();

        // A listing whose seller profile never existed.
        let pet_id = state
            .backend
            .call(|db| {
                db.conn().execute(
                    "INSERT INTO pets (id, name, pet_type, breed, age, description, image_url,
                                       seller_id, status, created_at)
                     VALUES ('p1', 'Rex', 'Dog', 'Mutt', 4, 'old', NULL, 'ghost', 'available',
                             '2024-01-01T00:00:00.000000Z')",
                    [],
                )?;
                Ok("p1".to_string())
            })
            .await
            .unwrap();

        let view = listing_detail(&state, &pet_id).await.unwrap();
        assert_eq!(view.seller.name, "Seller Account Not Found");
        assert_eq!(view.seller.role, "Unknown");
        assert_eq!(view.seller.uid.as_deref(), Some("ghost"));
        assert!(view.seller.error.is_some());
    }

    #[tokio::test]
    async fn contact_seller_paths() {
        let state = ClientState::in_memory().unwrap();
        let seller_uid = signed_in(&state, "sal@example.com", "Sal", Role::Seller).await;
        let listing = create_listing(&state, &form("Rabbit", "Lop")).await.unwrap();
        let seller = listing_detail(&state, &listing.id).await.unwrap().seller;

        assert!(matches!(
            contact_seller(&state, &seller).await,
            Err(ClientError::InvalidArgument(msg))
                if msg == "You cannot start a chat with yourself."
        ));

        let buyer_uid = signed_in(&state, "bo@example.com", "Bo", Role::Buyer).await;
        let session = contact_seller(&state, &seller).await.unwrap();
        assert_eq!(session.id, chat::derive_session_id(&buyer_uid, &seller_uid).unwrap());
        assert_eq!(session.participant_info[&buyer_uid].role, "Buyer");
        assert_eq!(session.participant_info[&seller_uid].name, "Sal");

        let no_uid = SellerInfo {
            uid: None,
            ..seller.clone()
        };
        assert!(matches!(
            contact_seller(&state, &no_uid).await,
            Err(ClientError::InvalidArgument(_))
        ));

        state.auth.logout();
        state.session.signed_out().await.unwrap();
        assert!(matches!(
            contact_seller(&state, &seller).await,
            Err(ClientError::NotSignedIn)
        ));
    }
}
