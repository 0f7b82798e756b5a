use super::source::{AddressSource, QueryError};

/// Well-known id of the address wrapper element, when the page has one.
pub const CONTAINER_ID: &str = "propertyAddress";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Street,
    City,
    State,
    Zip,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Street, Role::City, Role::State, Role::Zip];

    /// Substring matched against the role data attribute.
    fn needle(self) -> &'static str {
        match self {
            Role::Street => "PropertyDetails.Address",
            Role::City => "PropertyDetails.City",
            Role::State => "PropertyDetails.State",
            Role::Zip => "PropertyDetails.Zip",
        }
    }
}

/// The four address fragments at any stage; a missing fragment is an empty
/// string, never an error on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

impl Fields {
    fn set(&mut self, role: Role, value: String) {
        match role {
            Role::Street => self.street = value,
            Role::City => self.city = value,
            Role::State => self.state = value,
            Role::Zip => self.zip = value,
        }
    }
}

/// Resolve all four roles against the page. Each role walks its scope plan
/// independently; roles nothing matches stay empty.
pub fn locate_fields<S: AddressSource>(page: &S) -> Result<Fields, QueryError> {
    let container = page.has_container(CONTAINER_ID)?.then_some(CONTAINER_ID);
    let mut fields = Fields::default();
    for role in Role::ALL {
        fields.set(role, locate_role(page, container, role)?);
    }
    Ok(fields)
}

fn locate_role<S: AddressSource>(
    page: &S,
    container: Option<&'static str>,
    role: Role,
) -> Result<String, QueryError> {
    for scope in scope_plan(container) {
        if let Some(text) = page.role_text(scope, role.needle())? {
            if !text.is_empty() {
                return Ok(text);
            }
        }
    }
    Ok(String::new())
}

/// Ordered lookup scopes for one role: the container first when the page has
/// one, then the whole document. Without a container the single attempt is
/// already document-wide, so there is nothing to widen to.
fn scope_plan(container: Option<&'static str>) -> Vec<Option<&'static str>> {
    match container {
        Some(id) => vec![Some(id), None],
        None => vec![None],
    }
}

// ── Tests ──
