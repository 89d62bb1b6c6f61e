use glam::IVec2;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    pub max_clients: usize,
    pub spawn_position: IVec2,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: adrift::DEFAULT_TICK_RATE,
            max_clients: 32,
            spawn_position: IVec2::new(5, 5),
        }
    }
}
