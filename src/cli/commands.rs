//! # CLI Commands / 命令行子命令
//!
//! - `run` - Runs the configured items / 运行配置的测试项
//! - `worker` - Runs a single item for the process pool / 为进程池运行单个测试项
//! - `init` - Creates a configuration file / 创建配置文件

pub mod init;
pub mod run;
pub mod worker;
