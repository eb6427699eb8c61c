pub mod boot_manager;
