use crate::display::HpdRunner;

use super::FirmwareSink;

#[embassy_executor::task]
pub async fn run(runner: HpdRunner<'static, FirmwareSink>) {
    let _sink = runner.run().await;
}
