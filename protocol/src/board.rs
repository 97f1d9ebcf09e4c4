//! 棋盘状态

use crate::constants::BOARD_SIZE;
use crate::piece::{Piece, PieceColor, Square};

/// 8x8 棋盘，行优先存储，只有深色格可放子
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    squares: Vec<Option<Piece>>,
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            squares: vec![None; (BOARD_SIZE * BOARD_SIZE) as usize],
        }
    }

    /// 创建开局棋盘
    ///
    /// 黑兵在 0-2 行的深色格，白兵在 5-7 行的深色格。
    pub fn initial() -> Self {
        let mut board = Self::empty();

        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                let sq = Square::new(row, col);
                if !sq.is_dark() {
                    continue;
                }

                if row < 3 {
                    board.set(sq, Some(Piece::man(PieceColor::Black)));
                } else if row > 4 {
                    board.set(sq, Some(Piece::man(PieceColor::White)));
                }
            }
        }

        board
    }

    /// 获取指定位置的棋子；越界返回 None
    pub fn get(&self, sq: Square) -> Option<Piece> {
        if sq.in_board() {
            self.squares[sq.to_index()]
        } else {
            None
        }
    }

    /// 设置指定位置的棋子；越界忽略
    pub fn set(&mut self, sq: Square, piece: Option<Piece>) {
        if sq.in_board() {
            self.squares[sq.to_index()] = piece;
        }
    }

    /// 获取指定阵营的所有棋子位置
    pub fn pieces(&self, color: PieceColor) -> Vec<(Square, Piece)> {
        let mut result = Vec::new();
        for (index, slot) in self.squares.iter().enumerate() {
            if let Some(piece) = slot {
                if piece.color == color {
                    if let Some(sq) = Square::from_index(index) {
                        result.push((sq, *piece));
                    }
                }
            }
        }
        result
    }

    /// 指定阵营的棋子数量
    pub fn count(&self, color: PieceColor) -> usize {
        self.squares
            .iter()
            .filter(|slot| slot.map_or(false, |p| p.color == color))
            .count()
    }

    /// 序列化为 64 字符的行优先字符串（线上 board= 参数）
    pub fn to_wire(&self) -> String {
        self.squares
            .iter()
            .map(|slot| slot.map_or('.', |p| p.to_wire_char()))
            .collect()
    }

    /// 从线上字符串解析；长度或字符非法返回 None
    pub fn from_wire(s: &str) -> Option<Board> {
        if s.chars().count() != (BOARD_SIZE * BOARD_SIZE) as usize {
            return None;
        }

        let mut squares = Vec::with_capacity((BOARD_SIZE * BOARD_SIZE) as usize);
        for c in s.chars() {
            match c {
                '.' => squares.push(None),
                _ => squares.push(Some(Piece::from_wire_char(c)?)),
            }
        }

        Some(Board { squares })
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}
