pub mod vm_instance;
pub mod vm_pool;
pub mod vm_type;
