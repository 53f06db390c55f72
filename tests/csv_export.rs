use std::time::{Duration, UNIX_EPOCH};

use anyhow::Result;

use cvrace::{
    group_rows, load_position_rows, PositionRecorder, PositionSample, Spot, TimeFormat,
};

fn recorder() -> Result<PositionRecorder> {
    let mut recorder = PositionRecorder::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    recorder.record(PositionSample::new(Duration::from_millis(500), vec![Spot::new(12.0, 30.5)]))?;
    recorder.record(PositionSample::new(Duration::from_millis(750), Vec::new()))?;
    recorder.record(PositionSample::new(
        Duration::from_millis(1000),
        vec![Spot::new(20.0, 30.0), Spot::new(80.25, 31.0)],
    ))?;
    Ok(recorder)
}

#[test]
fn saved_file_groups_back_into_samples() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("positions.csv");
    let recorder = recorder()?;

    let rows = recorder.history().save_csv(&path, TimeFormat::EpochSeconds)?;
    assert_eq!(rows, 3);

    let text = std::fs::read_to_string(&path)?;
    assert!(text.starts_with("time,x,y\n"));

    let groups = group_rows(&load_position_rows(&path)?);
    assert_eq!(groups.len(), 2);
    assert!((groups[0].time - 1_700_000_000.5).abs() < 1e-6);
    assert_eq!(groups[1].spots, vec![Spot::new(20.0, 30.0), Spot::new(80.25, 31.0)]);
    Ok(())
}

#[test]
fn monotonic_millis_are_integers() -> Result<()> {
    let mut out = Vec::new();
    recorder()?.write_csv(&mut out, TimeFormat::MonotonicMillis)?;
    let text = String::from_utf8(out)?;
    let times: Vec<&str> = text
        .lines()
        .skip(1)
        .map(|line| line.split(',').next().unwrap_or_default())
        .collect();
    assert_eq!(times, vec!["500", "1000", "1000"]);
    Ok(())
}
