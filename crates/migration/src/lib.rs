pub use sea_orm_migration::*;

mod m20260510_01_create_extensions;
mod m20260510_02_create_entity_tables;
mod m20260510_03_create_interaction_tables;
mod m20260510_04_create_pending_resolution_table;
mod m20260512_01_create_segment_tables;
mod m20260512_02_create_activity_tables;
mod m20260512_03_create_commitment_table;
mod m20260514_01_create_approval_table;
mod m20260516_01_create_auth_tables;
mod m20260516_02_create_ops_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260510_01_create_extensions::Migration),
      Box::new(m20260510_02_create_entity_tables::Migration),
      Box::new(m20260510_03_create_interaction_tables::Migration),
      Box::new(m20260510_04_create_pending_resolution_table::Migration),
      Box::new(m20260512_01_create_segment_tables::Migration),
      Box::new(m20260512_02_create_activity_tables::Migration),
      Box::new(m20260512_03_create_commitment_table::Migration),
      Box::new(m20260514_01_create_approval_table::Migration),
      Box::new(m20260516_01_create_auth_tables::Migration),
      Box::new(m20260516_02_create_ops_tables::Migration),
    ]
  }
}
