use mindmirror_types::models::{UserProfile, UserRole};

/// Client-side destinations the session layer can redirect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRoute {
    Home,
    Login,
    Signup,
    PatientDashboard,
    PatientLinkDoctor,
    DoctorDashboard,
}

impl ClientRoute {
    pub fn as_path(&self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Signup => "/signup",
            Self::PatientDashboard => "/patient/dashboard",
            Self::PatientLinkDoctor => "/patient/link-doctor",
            Self::DoctorDashboard => "/doctor/dashboard",
        }
    }
}

pub fn dashboard(role: UserRole) -> ClientRoute {
    match role {
        UserRole::Patient => ClientRoute::PatientDashboard,
        UserRole::Doctor => ClientRoute::DoctorDashboard,
    }
}

/// The three entry points a resolved user gets bounced away from.
fn is_public_entry(path: &str) -> bool {
    matches!(path, "/" | "/login" | "/signup")
}

/// Which role a path is gated to, by prefix.
fn gated_role(path: &str) -> Option<UserRole> {
    if path.starts_with("/patient") {
        Some(UserRole::Patient)
    } else if path.starts_with("/doctor") {
        Some(UserRole::Doctor)
    } else {
        None
    }
}

/// Where the client should go, given where it is and who resolved.
///
/// Resolved users on a public entry point land on their role's dashboard.
/// Gated areas bounce visitors without a session, and visitors with the
/// wrong role, to login. Everyone else stays put.
pub fn redirect_for(path: &str, user: Option<&UserProfile>) -> Option<ClientRoute> {
    match user {
        Some(profile) => {
            if is_public_entry(path) {
                return Some(dashboard(profile.role()));
            }
            match gated_role(path) {
                Some(required) if required != profile.role() => Some(ClientRoute::Login),
                _ => None,
            }
        }
        None => gated_role(path).map(|_| ClientRoute::Login),
    }
}
