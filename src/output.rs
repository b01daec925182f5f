// src/output.rs
use std::io::Write;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, PrimitiveArray};
use arrow::datatypes::{DataType, Field, Schema, UInt32Type};
use arrow::error::Result as ArrowResult;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;

use serde::Serialize;

use crate::batch::BatchShape;

pub const IPC_ARROW_BATCH_SIZE: usize = 1 << 12;

/// One output slot with the input positions it was computed from.
/// `distance` is `None` for a missing slot and -1 when over the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceRecord {
    pub index: u32,
    pub src_index: u32,
    pub tgt_index: u32,
    pub distance: Option<f64>,
}

impl DistanceRecord {
    pub fn new(shape: BatchShape, index: usize, distance: Option<f64>) -> Self {
        let (src_index, tgt_index) = shape.indices(index);
        DistanceRecord {
            index: index as u32,
            src_index: src_index as u32,
            tgt_index: tgt_index as u32,
            distance,
        }
    }
}

/// Pairs each result with its slot index, starting at `offset`.
pub fn records(shape: BatchShape, offset: usize, results: &[Option<f64>]) -> Vec<DistanceRecord> {
    results
        .iter()
        .enumerate()
        .map(|(k, d)| DistanceRecord::new(shape, offset + k, *d))
        .collect()
}

pub fn distance_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("index", DataType::UInt32, false),
        Field::new("src_index", DataType::UInt32, false),
        Field::new("tgt_index", DataType::UInt32, false),
        Field::new("distance", DataType::Float64, true),
    ]))
}

/// Column buffers flushed to an IPC writer every [`IPC_ARROW_BATCH_SIZE`] rows.
pub struct IpcDataBatch {
    index: Vec<u32>,
    src_index: Vec<u32>,
    tgt_index: Vec<u32>,
    distance: Vec<Option<f64>>,
}

impl IpcDataBatch {
    pub fn new() -> Self {
        IpcDataBatch {
            index: Vec::with_capacity(IPC_ARROW_BATCH_SIZE),
            src_index: Vec::with_capacity(IPC_ARROW_BATCH_SIZE),
            tgt_index: Vec::with_capacity(IPC_ARROW_BATCH_SIZE),
            distance: Vec::with_capacity(IPC_ARROW_BATCH_SIZE),
        }
    }

    pub fn add(&mut self, record: &DistanceRecord) {
        self.index.push(record.index);
        self.src_index.push(record.src_index);
        self.tgt_index.push(record.tgt_index);
        self.distance.push(record.distance);
    }

    pub fn is_full(&self) -> bool {
        self.index.len() >= IPC_ARROW_BATCH_SIZE
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn write_to_arrow_and_clear<W: Write>(&mut self, writer: &mut FileWriter<W>, schema: &Arc<Schema>) -> ArrowResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        let col_index: ArrayRef = Arc::new(PrimitiveArray::<UInt32Type>::from(std::mem::take(&mut self.index)));
        let col_src: ArrayRef = Arc::new(PrimitiveArray::<UInt32Type>::from(std::mem::take(&mut self.src_index)));
        let col_tgt: ArrayRef = Arc::new(PrimitiveArray::<UInt32Type>::from(std::mem::take(&mut self.tgt_index)));
        let col_distance: ArrayRef = Arc::new(Float64Array::from(std::mem::take(&mut self.distance)));
        let batch = RecordBatch::try_new(schema.clone(), vec![col_index, col_src, col_tgt, col_distance])?;
        writer.write(&batch)
    }
}

impl Default for IpcDataBatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Encodes records as a complete Arrow IPC file.
pub fn records_to_ipc_bytes(records: &[DistanceRecord]) -> ArrowResult<Vec<u8>> {
    let schema = distance_schema();
    let mut writer = FileWriter::try_new(Vec::new(), &schema)?;
    let mut batch = IpcDataBatch::new();
    for record in records {
        batch.add(record);
        if batch.is_full() {
            batch.write_to_arrow_and_clear(&mut writer, &schema)?;
        }
    }
    batch.write_to_arrow_and_clear(&mut writer, &schema)?;
    writer.finish()?;
    writer.into_inner()
}

pub fn records_to_json(records: &[DistanceRecord]) -> serde_json::Result<String> {
    serde_json::to_string(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, UInt32Array};
    use arrow::ipc::reader::FileReader;
    use std::io::Cursor;

    fn shape() -> BatchShape {
        BatchShape::new(3, 2).unwrap()
    }

    #[test]
    fn records_carry_recycled_indices() {
        let recs = records(shape(), 1, &[Some(1.0), None]);
        assert_eq!(recs[0], DistanceRecord { index: 1, src_index: 1, tgt_index: 1, distance: Some(1.0) });
        assert_eq!(recs[1], DistanceRecord { index: 2, src_index: 2, tgt_index: 0, distance: None });
    }

    #[test]
    fn json_uses_null_for_missing() {
        let recs = records(shape(), 0, &[Some(2.5), None, Some(-1.0)]);
        let json = records_to_json(&recs).unwrap();
        assert_eq!(
            json,
            r#"[{"index":0,"src_index":0,"tgt_index":0,"distance":2.5},{"index":1,"src_index":1,"tgt_index":1,"distance":null},{"index":2,"src_index":2,"tgt_index":0,"distance":-1.0}]"#
        );
    }

    #[test]
    fn ipc_bytes_read_back_across_batches() {
        let n = IPC_ARROW_BATCH_SIZE + 7;
        let shape = BatchShape::new(n, 1).unwrap();
        let results: Vec<Option<f64>> = (0..n).map(|k| if k % 5 == 0 { None } else { Some(k as f64) }).collect();
        let bytes = records_to_ipc_bytes(&records(shape, 0, &results)).unwrap();

        let reader = FileReader::try_new(Cursor::new(bytes), None).unwrap();
        let mut seen = Vec::new();
        let mut batches = 0;
        for batch in reader {
            let batch = batch.unwrap();
            batches += 1;
            let index = batch.column(0).as_any().downcast_ref::<UInt32Array>().unwrap();
            let tgt = batch.column(2).as_any().downcast_ref::<UInt32Array>().unwrap();
            let dist = batch.column(3).as_any().downcast_ref::<Float64Array>().unwrap();
            for row in 0..batch.num_rows() {
                assert_eq!(tgt.value(row), 0);
                let d = if dist.is_null(row) { None } else { Some(dist.value(row)) };
                seen.push((index.value(row) as usize, d));
            }
        }
        assert_eq!(batches, 2);
        assert_eq!(seen.len(), n);
        for (k, d) in seen {
            assert_eq!(d, results[k]);
        }
    }
}
