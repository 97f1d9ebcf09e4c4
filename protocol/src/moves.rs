//! 走法生成与捷克规则校验
//!
//! 规则要点：
//! - 兵只能向前走一格，吃子也只能向前跳（不允许向后吃）。
//! - 王沿对角线飞行任意距离，越过恰好一个敌子即为吃子，
//!   落点可以是敌子之后直到下一个障碍前的任意空格。
//! - 全局强制吃子：己方任意棋子能吃时，普通走法一律拒绝。
//! - 连吃由调用方用 capture_lock 约束（同一棋子吃到无可吃为止）。

use thiserror::Error;

use crate::board::Board;
use crate::constants::BOARD_SIZE;
use crate::piece::{Piece, PieceColor, Square};

/// 走法校验失败原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    /// 坐标越界
    #[error("square outside the board")]
    OutOfBoard,

    /// 浅色格不可用
    #[error("only dark squares are playable")]
    InvalidSquare,

    /// 起点无子
    #[error("no piece on source square")]
    NoPiece,

    /// 起点不是己方棋子
    #[error("piece belongs to the opponent")]
    NotYourPiece,

    /// 落点非空
    #[error("destination square is not empty")]
    DestNotEmpty,

    /// 不是合法走法（形状或路径非法）
    #[error("not a legal move")]
    InvalidMove,

    /// 兵不能向后走
    #[error("men may only move forward")]
    InvalidDirection,

    /// 存在吃子机会时必须吃子
    #[error("a capture is available and must be played")]
    MustCapture,

    /// 跳吃的中间格没有敌子
    #[error("no opponent piece to capture")]
    NoOpponentToCapture,
}

/// 经过校验、尚未落子的走法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedMove {
    pub piece: Piece,
    pub from: Square,
    pub to: Square,
    /// 被吃子所在格（吃子走法才有）
    pub captured: Option<Square>,
}

/// 落子结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub captured: Option<Square>,
    /// 本步是否升王
    pub promoted: bool,
    /// 落点处的棋子（可能已升王）
    pub piece: Piece,
}

/// 规则引擎：对棋盘的纯函数集合
pub struct Rules;

impl Rules {
    /// 指定格上的棋子能否吃子
    pub fn can_capture_from(board: &Board, sq: Square) -> bool {
        let Some(piece) = board.get(sq) else {
            return false;
        };

        if piece.king {
            !Self::king_capture_moves(board, sq, piece.color).is_empty()
        } else {
            !Self::man_capture_moves(board, sq, piece).is_empty()
        }
    }

    /// 阵营是否存在任何吃子机会（全局强制吃子检查）
    pub fn side_has_capture(board: &Board, color: PieceColor) -> bool {
        board
            .pieces(color)
            .iter()
            .any(|(sq, _)| Self::can_capture_from(board, *sq))
    }

    /// 阵营是否还有棋子
    pub fn side_has_piece(board: &Board, color: PieceColor) -> bool {
        board.count(color) > 0
    }

    /// 阵营是否还有任何走法（吃子或普通走法）
    pub fn side_has_any_move(board: &Board, color: PieceColor) -> bool {
        if Self::side_has_capture(board, color) {
            return true;
        }
        board
            .pieces(color)
            .iter()
            .any(|(sq, _)| !Self::simple_moves(board, *sq).is_empty())
    }

    /// 指定格棋子的所有普通（非吃子）落点
    pub fn simple_moves(board: &Board, sq: Square) -> Vec<Square> {
        let Some(piece) = board.get(sq) else {
            return Vec::new();
        };

        if piece.king {
            Self::king_simple_moves(board, sq)
        } else {
            let mut out = Vec::new();
            for (d_row, d_col) in piece.directions() {
                if let Some(to) = sq.offset(*d_row, *d_col) {
                    if board.get(to).is_none() {
                        out.push(to);
                    }
                }
            }
            out
        }
    }

    /// 指定格棋子的所有吃子落点
    pub fn capture_moves(board: &Board, sq: Square) -> Vec<Square> {
        let Some(piece) = board.get(sq) else {
            return Vec::new();
        };

        if piece.king {
            Self::king_capture_moves(board, sq, piece.color)
        } else {
            Self::man_capture_moves(board, sq, piece)
        }
    }

    /// 兵的吃子落点：前向斜跳两格，中间须是敌子且落点为空
    fn man_capture_moves(board: &Board, sq: Square, piece: Piece) -> Vec<Square> {
        let mut out = Vec::new();
        for (d_row, d_col) in piece.directions() {
            let Some(mid) = sq.offset(*d_row, *d_col) else {
                continue;
            };
            let Some(to) = sq.offset(2 * d_row, 2 * d_col) else {
                continue;
            };
            if board.get(to).is_some() {
                continue;
            }
            if board.get(mid).map_or(false, |p| p.color != piece.color) {
                out.push(to);
            }
        }
        out
    }

    /// 王的普通落点：每个方向滑到第一个障碍前
    fn king_simple_moves(board: &Board, sq: Square) -> Vec<Square> {
        let mut out = Vec::new();
        for (d_row, d_col) in Piece::king(PieceColor::White).directions() {
            let mut cur = sq;
            while let Some(next) = cur.offset(*d_row, *d_col) {
                if board.get(next).is_some() {
                    break;
                }
                out.push(next);
                cur = next;
            }
        }
        out
    }

    /// 王的吃子落点
    ///
    /// 沿方向滑行：第一个非空格若是敌子且其后为空，则从紧随其后的
    /// 空格起到下一个障碍前的所有空格都是落点；若是己方棋子或第二个
    /// 敌子，该方向终结。
    fn king_capture_moves(board: &Board, sq: Square, color: PieceColor) -> Vec<Square> {
        let mut out = Vec::new();
        for (d_row, d_col) in Piece::king(color).directions() {
            let mut cur = sq;
            let mut enemy_found = false;
            while let Some(next) = cur.offset(*d_row, *d_col) {
                match board.get(next) {
                    None => {
                        if enemy_found {
                            out.push(next);
                        }
                    }
                    Some(p) if p.color == color => break,
                    Some(_) => {
                        if enemy_found {
                            break;
                        }
                        enemy_found = true;
                    }
                }
                cur = next;
            }
        }
        out
    }

    /// 校验一步棋（只计算，不落子）
    ///
    /// `capture_available` 是全局强制吃子检查的结果，由调用方用
    /// [`Rules::side_has_capture`] 算出。错误优先级与线协议一致。
    pub fn validate(
        board: &Board,
        mover: PieceColor,
        from: Square,
        to: Square,
        capture_available: bool,
    ) -> Result<PlannedMove, MoveError> {
        if !from.in_board() || !to.in_board() {
            return Err(MoveError::OutOfBoard);
        }
        if !from.is_dark() || !to.is_dark() {
            return Err(MoveError::InvalidSquare);
        }

        let piece = board.get(from).ok_or(MoveError::NoPiece)?;
        if piece.color != mover {
            return Err(MoveError::NotYourPiece);
        }
        if board.get(to).is_some() {
            return Err(MoveError::DestNotEmpty);
        }

        let d_row = to.row - from.row;
        let d_col = to.col - from.col;
        if d_row.abs() != d_col.abs() || d_row == 0 {
            return Err(MoveError::InvalidMove);
        }

        if piece.king {
            Self::validate_king(board, piece, from, to, capture_available)
        } else {
            Self::validate_man(board, piece, from, to, capture_available)
        }
    }

    /// 王：沿对角线走查路径，己方棋子或第二个敌子都非法
    fn validate_king(
        board: &Board,
        piece: Piece,
        from: Square,
        to: Square,
        capture_available: bool,
    ) -> Result<PlannedMove, MoveError> {
        let step_row = if to.row > from.row { 1 } else { -1 };
        let step_col = if to.col > from.col { 1 } else { -1 };

        let mut captured = None;
        let mut cur = Square::new(from.row + step_row, from.col + step_col);
        while cur != to {
            if let Some(p) = board.get(cur) {
                if p.color == piece.color || captured.is_some() {
                    return Err(MoveError::InvalidMove);
                }
                captured = Some(cur);
            }
            cur = Square::new(cur.row + step_row, cur.col + step_col);
        }

        if captured.is_none() && capture_available {
            return Err(MoveError::MustCapture);
        }

        Ok(PlannedMove {
            piece,
            from,
            to,
            captured,
        })
    }

    /// 兵：一格为普通走法、两格为跳吃，方向必须向前
    fn validate_man(
        board: &Board,
        piece: Piece,
        from: Square,
        to: Square,
        capture_available: bool,
    ) -> Result<PlannedMove, MoveError> {
        let d_row = to.row - from.row;
        let d_col = to.col - from.col;

        let is_simple = d_row.abs() == 1;
        let is_capture = d_row.abs() == 2;
        if !is_simple && !is_capture {
            return Err(MoveError::InvalidMove);
        }

        if d_row.signum() != piece.forward() {
            return Err(MoveError::InvalidDirection);
        }

        if is_simple {
            if capture_available {
                return Err(MoveError::MustCapture);
            }
            return Ok(PlannedMove {
                piece,
                from,
                to,
                captured: None,
            });
        }

        let mid = Square::new(from.row + d_row / 2, from.col + d_col / 2);
        match board.get(mid) {
            Some(p) if p.color != piece.color => Ok(PlannedMove {
                piece,
                from,
                to,
                captured: Some(mid),
            }),
            _ => Err(MoveError::NoOpponentToCapture),
        }
    }

    /// 执行已校验的走法并处理升王
    pub fn apply(board: &mut Board, planned: &PlannedMove) -> MoveOutcome {
        if let Some(captured) = planned.captured {
            board.set(captured, None);
        }

        board.set(planned.from, None);

        let mut piece = planned.piece;
        let promotion_row = match piece.color {
            PieceColor::White => 0,
            PieceColor::Black => BOARD_SIZE - 1,
        };
        let promoted = !piece.king && planned.to.row == promotion_row;
        if promoted {
            piece = piece.promoted();
        }
        board.set(planned.to, Some(piece));

        MoveOutcome {
            captured: planned.captured,
            promoted,
            piece,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(row: i32, col: i32) -> Square {
        Square::new(row, col)
    }

    /// 从 64 字符串构造棋盘，测试专用
    fn board_from(s: &str) -> Board {
        Board::from_wire(s).expect("valid test board")
    }

    #[test]
    fn test_initial_simple_moves() {
        let board = Board::initial();

        // 白兵 (5,0) 只能走 (4,1)；(4,0) 是浅色格的左前方越界
        assert_eq!(Rules::simple_moves(&board, sq(5, 0)), vec![sq(4, 1)]);

        // (5,2) 两个前向落点
        let moves = Rules::simple_moves(&board, sq(5, 2));
        assert_eq!(moves.len(), 2);
        assert!(moves.contains(&sq(4, 1)));
        assert!(moves.contains(&sq(4, 3)));

        // 开局无吃子机会
        assert!(!Rules::side_has_capture(&board, PieceColor::White));
        assert!(!Rules::side_has_capture(&board, PieceColor::Black));
    }

    #[test]
    fn test_man_capture_detected() {
        let mut board = Board::empty();
        board.set(sq(5, 2), Some(Piece::man(PieceColor::White)));
        board.set(sq(4, 3), Some(Piece::man(PieceColor::Black)));

        assert!(Rules::can_capture_from(&board, sq(5, 2)));
        assert!(Rules::side_has_capture(&board, PieceColor::White));
        assert_eq!(Rules::capture_moves(&board, sq(5, 2)), vec![sq(3, 4)]);

        // 落点被占则不可吃
        board.set(sq(3, 4), Some(Piece::man(PieceColor::Black)));
        assert!(!Rules::can_capture_from(&board, sq(5, 2)));
    }

    #[test]
    fn test_man_cannot_capture_backwards() {
        let mut board = Board::empty();
        board.set(sq(3, 2), Some(Piece::man(PieceColor::White)));
        board.set(sq(4, 3), Some(Piece::man(PieceColor::Black)));

        // 敌子在白兵后方，不可向后跳吃
        assert!(!Rules::can_capture_from(&board, sq(3, 2)));
        let err = Rules::validate(&board, PieceColor::White, sq(3, 2), sq(5, 4), false);
        assert_eq!(err, Err(MoveError::InvalidDirection));
    }

    #[test]
    fn test_simple_move_rejected_when_capture_exists() {
        let mut board = Board::empty();
        board.set(sq(5, 2), Some(Piece::man(PieceColor::White)));
        board.set(sq(4, 3), Some(Piece::man(PieceColor::Black)));

        let capture_available = Rules::side_has_capture(&board, PieceColor::White);
        assert!(capture_available);

        // 普通走法被全局强制吃子拒绝
        let err = Rules::validate(
            &board,
            PieceColor::White,
            sq(5, 2),
            sq(4, 1),
            capture_available,
        );
        assert_eq!(err, Err(MoveError::MustCapture));

        // 吃子走法通过
        let planned = Rules::validate(
            &board,
            PieceColor::White,
            sq(5, 2),
            sq(3, 4),
            capture_available,
        )
        .expect("capture move should validate");
        assert_eq!(planned.captured, Some(sq(4, 3)));
    }

    #[test]
    fn test_validate_error_order() {
        let mut board = Board::empty();
        board.set(sq(5, 2), Some(Piece::man(PieceColor::White)));
        board.set(sq(4, 1), Some(Piece::man(PieceColor::Black)));

        assert_eq!(
            Rules::validate(&board, PieceColor::White, sq(5, 2), sq(9, 9), false),
            Err(MoveError::OutOfBoard)
        );
        assert_eq!(
            Rules::validate(&board, PieceColor::White, sq(5, 2), sq(4, 4), false),
            Err(MoveError::InvalidSquare)
        );
        assert_eq!(
            Rules::validate(&board, PieceColor::White, sq(5, 0), sq(4, 1), false),
            Err(MoveError::NoPiece)
        );
        assert_eq!(
            Rules::validate(&board, PieceColor::White, sq(4, 1), sq(3, 2), false),
            Err(MoveError::NotYourPiece)
        );
        assert_eq!(
            Rules::validate(&board, PieceColor::White, sq(5, 2), sq(4, 1), false),
            Err(MoveError::DestNotEmpty)
        );
        // 非对角
        assert_eq!(
            Rules::validate(&board, PieceColor::White, sq(5, 2), sq(3, 2), false),
            Err(MoveError::InvalidMove)
        );
        // 跳吃中间无敌子
        assert_eq!(
            Rules::validate(&board, PieceColor::White, sq(5, 2), sq(3, 4), false),
            Err(MoveError::NoOpponentToCapture)
        );
    }

    #[test]
    fn test_king_slides() {
        let mut board = Board::empty();
        board.set(sq(4, 3), Some(Piece::king(PieceColor::White)));
        board.set(sq(1, 0), Some(Piece::man(PieceColor::White)));

        let moves = Rules::simple_moves(&board, sq(4, 3));
        // 左上方向被 (1,0) 的己方棋子截断：(3,2)、(2,1)
        assert!(moves.contains(&sq(3, 2)));
        assert!(moves.contains(&sq(2, 1)));
        assert!(!moves.contains(&sq(1, 0)));
        // 右下方向滑到底
        assert!(moves.contains(&sq(7, 6)));
    }

    #[test]
    fn test_king_capture_landing_range() {
        let mut board = Board::empty();
        board.set(sq(7, 0), Some(Piece::king(PieceColor::White)));
        board.set(sq(5, 2), Some(Piece::man(PieceColor::Black)));
        board.set(sq(1, 6), Some(Piece::man(PieceColor::Black)));

        // 越过 (5,2) 后可落 (4,3)、(3,4)、(2,5)，(1,6) 是第二个敌子
        let moves = Rules::capture_moves(&board, sq(7, 0));
        assert_eq!(moves, vec![sq(4, 3), sq(3, 4), sq(2, 5)]);

        // 远落点也能通过校验并吃掉 (5,2)
        let planned = Rules::validate(&board, PieceColor::White, sq(7, 0), sq(2, 5), true)
            .expect("long capture should validate");
        assert_eq!(planned.captured, Some(sq(5, 2)));

        // 越过两个敌子非法
        assert_eq!(
            Rules::validate(&board, PieceColor::White, sq(7, 0), sq(0, 7), true),
            Err(MoveError::InvalidMove)
        );
    }

    #[test]
    fn test_king_blocked_by_own_piece() {
        let mut board = Board::empty();
        board.set(sq(7, 0), Some(Piece::king(PieceColor::White)));
        board.set(sq(5, 2), Some(Piece::man(PieceColor::White)));

        assert!(Rules::capture_moves(&board, sq(7, 0)).is_empty());
        assert_eq!(
            Rules::validate(&board, PieceColor::White, sq(7, 0), sq(4, 3), false),
            Err(MoveError::InvalidMove)
        );
    }

    #[test]
    fn test_king_simple_rejected_when_capture_exists() {
        let mut board = Board::empty();
        board.set(sq(7, 0), Some(Piece::king(PieceColor::White)));
        board.set(sq(5, 2), Some(Piece::man(PieceColor::Black)));

        let capture_available = Rules::side_has_capture(&board, PieceColor::White);
        assert_eq!(
            Rules::validate(
                &board,
                PieceColor::White,
                sq(7, 0),
                sq(6, 1),
                capture_available
            ),
            Err(MoveError::MustCapture)
        );
    }

    #[test]
    fn test_apply_capture_and_board_delta() {
        let mut board = Board::empty();
        board.set(sq(5, 2), Some(Piece::man(PieceColor::White)));
        board.set(sq(4, 3), Some(Piece::man(PieceColor::Black)));

        let planned = Rules::validate(&board, PieceColor::White, sq(5, 2), sq(3, 4), true)
            .expect("capture move");
        let outcome = Rules::apply(&mut board, &planned);

        assert_eq!(outcome.captured, Some(sq(4, 3)));
        assert!(!outcome.promoted);
        assert_eq!(board.get(sq(5, 2)), None);
        assert_eq!(board.get(sq(4, 3)), None);
        assert_eq!(board.get(sq(3, 4)), Some(Piece::man(PieceColor::White)));
        assert_eq!(board.count(PieceColor::Black), 0);
        assert_eq!(board.count(PieceColor::White), 1);
    }

    #[test]
    fn test_promotion_on_last_row() {
        let mut board = Board::empty();
        board.set(sq(1, 2), Some(Piece::man(PieceColor::White)));

        let planned =
            Rules::validate(&board, PieceColor::White, sq(1, 2), sq(0, 1), false).expect("move");
        let outcome = Rules::apply(&mut board, &planned);

        assert!(outcome.promoted);
        assert_eq!(board.get(sq(0, 1)), Some(Piece::king(PieceColor::White)));

        // 黑兵在第 7 行升王
        let mut board = Board::empty();
        board.set(sq(6, 1), Some(Piece::man(PieceColor::Black)));
        let planned =
            Rules::validate(&board, PieceColor::Black, sq(6, 1), sq(7, 2), false).expect("move");
        let outcome = Rules::apply(&mut board, &planned);
        assert!(outcome.promoted);
        assert_eq!(board.get(sq(7, 2)), Some(Piece::king(PieceColor::Black)));
    }

    #[test]
    fn test_capture_chain_continues_from_landing_square() {
        // 白兵 (5,2) 吃 (4,3) 落 (3,4)，再吃 (2,5) 可落 (1,6)
        let mut board = Board::empty();
        board.set(sq(5, 2), Some(Piece::man(PieceColor::White)));
        board.set(sq(4, 3), Some(Piece::man(PieceColor::Black)));
        board.set(sq(2, 5), Some(Piece::man(PieceColor::Black)));

        let planned = Rules::validate(&board, PieceColor::White, sq(5, 2), sq(3, 4), true)
            .expect("first capture");
        Rules::apply(&mut board, &planned);

        assert!(Rules::can_capture_from(&board, sq(3, 4)));
        assert_eq!(Rules::capture_moves(&board, sq(3, 4)), vec![sq(1, 6)]);
    }

    #[test]
    fn test_side_has_any_move() {
        let mut board = Board::empty();
        board.set(sq(0, 1), Some(Piece::man(PieceColor::Black)));
        board.set(sq(7, 0), Some(Piece::man(PieceColor::White)));

        assert!(Rules::side_has_any_move(&board, PieceColor::Black));

        // 黑兵被堵死：前方两格都被占、无子可吃
        board.set(sq(1, 0), Some(Piece::man(PieceColor::Black)));
        board.set(sq(1, 2), Some(Piece::man(PieceColor::Black)));
        board.set(sq(2, 1), Some(Piece::man(PieceColor::Black)));
        board.set(sq(2, 3), Some(Piece::man(PieceColor::Black)));
        board.set(sq(3, 0), Some(Piece::man(PieceColor::Black)));
        board.set(sq(3, 2), Some(Piece::man(PieceColor::Black)));
        board.set(sq(3, 4), Some(Piece::man(PieceColor::Black)));
        board.set(sq(4, 1), Some(Piece::man(PieceColor::Black)));
        board.set(sq(4, 3), Some(Piece::man(PieceColor::Black)));
        board.set(sq(4, 5), Some(Piece::man(PieceColor::Black)));

        // 白兵 (7,0) 只能走 (6,1)；占住 (6,1) 并堵死跳吃落点 (5,2)
        // 后白方无步可走
        board.set(sq(6, 1), Some(Piece::man(PieceColor::Black)));
        board.set(sq(5, 2), Some(Piece::man(PieceColor::Black)));
        assert!(!Rules::side_has_any_move(&board, PieceColor::White));
    }

    #[test]
    fn test_board_from_wire_helper() {
        // 确认测试用构造器与手工摆子一致
        let mut expected = Board::empty();
        expected.set(sq(0, 1), Some(Piece::king(PieceColor::Black)));
        let wire: String = (0..64)
            .map(|i| if i == 1 { 'B' } else { '.' })
            .collect();
        assert_eq!(board_from(&wire), expected);
    }
}
