use crate::services::admin_service::AdminService;

#[derive(Clone)]
pub struct AppState {
    pub admin_service: AdminService,
    pub admin_ids: Vec<i64>,
}

impl AppState {
    pub fn is_admin(&self, tg_id: i64) -> bool {
        self.admin_ids.contains(&tg_id)
    }
}
