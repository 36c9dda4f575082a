//! Main App Component

use leptos::prelude::*;
use leptos_router::{components::*, path};

use crate::pages::{HistoryPage, PosPage, PricingPage};

/// Root application component
#[component]
pub fn App() -> impl IntoView {
    view! {
        <Router>
            <nav class="tabs">
                <A href="/">"Charge"</A>
                <A href="/history">"History"</A>
                <A href="/pricing">"Plan"</A>
            </nav>
            <main class="app">
                <Routes fallback=|| view! { <p>"Page not found"</p> }>
                    <Route path=path!("/") view=PosPage />
                    <Route path=path!("/history") view=HistoryPage />
                    <Route path=path!("/pricing") view=PricingPage />
                </Routes>
            </main>
        </Router>
    }
}
